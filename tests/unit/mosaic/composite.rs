use super::*;
use crate::image::pixel::Rgba;
use crate::mosaic::masks::MemoryMaskStore;

fn flat(w: usize, h: usize, v: f32) -> ImageView<Rgba> {
    ImageView::from_fn(w, h, move |_, _| Rgba::new([v, v, v, 1.0]))
}

fn composite() -> ImageComposite<Rgba> {
    ImageComposite::new(
        GenerationCache::new(64 * 1024 * 1024),
        Arc::new(MemoryMaskStore::new()),
    )
}

#[test]
fn view_bbox_is_union_of_placements() {
    let mut c = composite();
    assert_eq!(c.insert(flat(10, 10, 0.5), -5, 3).unwrap(), 0);
    assert_eq!(c.insert(flat(6, 6, 0.5), 4, 0).unwrap(), 1);
    assert_eq!(c.view_bbox(), PixelBox::from_corners(-5, 0, 10, 13));
    assert_eq!(c.bbox(), c.view_bbox());
    assert_eq!((c.cols(), c.rows()), (15, 13));
    assert_eq!(c.source_count(), 2);
    assert_eq!(c.source_placement(1), Some(PixelBox::new(4, 0, 6, 6)));
    assert_eq!(c.levels(), None);

    c.prepare().unwrap();
    assert!(c.is_prepared());
    assert_eq!(c.levels(), Some(1));
}

#[test]
fn depth_comes_from_smallest_source() {
    let mut c = composite();
    c.insert(flat(100, 120, 0.5), 0, 0).unwrap();
    c.insert(flat(130, 100, 0.5), 90, 0).unwrap();
    c.set_draft_mode(true);
    c.prepare().unwrap();
    assert_eq!(c.levels(), Some(4));
}

#[test]
fn call_order_is_validated() {
    let mut c = composite();
    assert!(matches!(c.prepare(), Err(MosaicError::Validation(_))));
    assert!(matches!(
        c.insert(flat(0, 4, 0.5), 0, 0),
        Err(MosaicError::Validation(_))
    ));

    c.insert(flat(8, 8, 0.5), 0, 0).unwrap();
    assert!(matches!(
        c.render(PixelBox::new(0, 0, 8, 8)),
        Err(MosaicError::Validation(_))
    ));
    c.prepare().unwrap();
    assert!(matches!(c.prepare(), Err(MosaicError::Validation(_))));
    assert!(matches!(
        c.insert(flat(8, 8, 0.5), 0, 0),
        Err(MosaicError::Validation(_))
    ));
}

#[test]
fn pixel_access_is_unsupported() {
    let mut c = composite();
    c.insert(flat(8, 8, 0.5), 0, 0).unwrap();
    c.prepare().unwrap();
    assert!(matches!(c.pixel(1, 1), Err(MosaicError::Unsupported(_))));
}

#[test]
fn explicit_bbox_overrides_union() {
    let mut c = composite();
    c.insert(flat(8, 8, 0.25), 0, 0).unwrap();
    assert!(c.prepare_with_bbox(PixelBox::new(0, 0, 0, 5)).is_err());
    assert!(!c.is_prepared());

    c.prepare_with_bbox(PixelBox::new(-4, -4, 16, 16)).unwrap();
    assert_eq!((c.cols(), c.rows()), (16, 16));
    assert_eq!(c.bbox(), PixelBox::new(0, 0, 8, 8));

    let out = c.render(PixelBox::new(0, 0, 16, 16)).unwrap();
    assert_eq!(out.get(0, 0), Rgba::default());
    let inside = out.get(6, 6);
    assert!((inside.0[0] - 0.25).abs() < 1e-4, "{inside:?}");
    assert!((inside.0[3] - 1.0).abs() < 1e-4);
}

#[test]
fn into_view_renders_like_render() {
    let mut c = composite();
    c.insert(flat(12, 10, 0.6), 0, 0).unwrap();
    c.insert(flat(12, 10, 0.2), 6, 2).unwrap();
    c.prepare().unwrap();
    let direct = c.render(PixelBox::new(2, 1, 9, 7)).unwrap();
    let view = c.into_view().unwrap();
    assert_eq!((view.width(), view.height()), (18, 12));
    assert_eq!(view.rasterize(PixelBox::new(2, 1, 9, 7)).unwrap(), direct);
}

#[test]
fn masks_are_generated_at_prepare_and_skipped_in_draft_mode() {
    let store = Arc::new(MemoryMaskStore::new());
    let mut c: ImageComposite<Rgba> =
        ImageComposite::new(GenerationCache::default(), store.clone());
    c.insert(flat(8, 8, 0.5), 0, 0).unwrap();
    c.insert(flat(8, 8, 0.5), 4, 0).unwrap();
    c.prepare().unwrap();
    assert_eq!(store.len(), 2);

    let draft_store = Arc::new(MemoryMaskStore::new());
    let mut d: ImageComposite<Rgba> = ImageComposite::with_opts(
        GenerationCache::default(),
        draft_store.clone(),
        CompositeOpts {
            draft_mode: true,
            ..CompositeOpts::default()
        },
    );
    d.insert(flat(8, 8, 0.5), 0, 0).unwrap();
    d.prepare().unwrap();
    assert!(draft_store.is_empty());
    assert!(d.render(PixelBox::new(0, 0, 8, 8)).is_ok());
}

#[test]
fn failing_source_fails_only_dependent_patches() {
    let mut c = composite();
    c.insert(flat(8, 8, 0.5), 0, 0).unwrap();
    c.set_draft_mode(true);
    let broken: ImageView<Rgba> =
        ImageView::new(8, 8, |_| Err(MosaicError::generation("unreadable")));
    c.insert(broken, 100, 0).unwrap();
    c.prepare().unwrap();

    assert!(c.render(PixelBox::new(0, 0, 8, 8)).is_ok());
    assert!(matches!(
        c.render(PixelBox::new(100, 0, 8, 8)),
        Err(MosaicError::Generation(_))
    ));
}
