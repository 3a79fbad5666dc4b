use super::*;
use crate::image::pixel::Rgba;
use crate::mosaic::pyramid::build_pyramid;

struct FakeSource {
    placement: PixelBox,
    image: ImageBuf<Rgba>,
    mask: ImageBuf<f32>,
    levels: usize,
    canvas: (usize, usize),
}

impl FakeSource {
    fn new(image: ImageBuf<Rgba>, x: i32, y: i32, levels: usize, canvas: (usize, usize)) -> Self {
        let mask = image.map(|p| if p.alpha() > 0.0 { 1.0f32 } else { 0.0 });
        Self {
            placement: image.bounds().translate(x, y),
            image,
            mask,
            levels,
            canvas,
        }
    }
}

impl PatchSource<Rgba> for FakeSource {
    fn placement(&self) -> PixelBox {
        self.placement
    }

    fn pyramid_resident(&self) -> bool {
        false
    }

    fn pyramid(&self) -> MosaicResult<Arc<Pyramid<Rgba>>> {
        build_pyramid(
            &self.image,
            self.placement,
            self.canvas,
            self.mask.clone(),
            self.levels,
            false,
        )
        .map(Arc::new)
    }

    fn alpha(&self) -> MosaicResult<Arc<ImageBuf<f32>>> {
        Ok(Arc::new(self.image.alpha_plane()))
    }

    fn pixels(&self, local: PixelBox) -> MosaicResult<ImageBuf<Rgba>> {
        Ok(self.image.region(local))
    }
}

fn textured(w: usize, h: usize) -> ImageBuf<Rgba> {
    ImageBuf::from_fn(w, h, |x, y| {
        let a = match (x * 5 + y * 3) % 13 {
            0 => 0.0,
            1 | 2 => 0.5,
            _ => 1.0,
        };
        let r = ((x * 37 + y * 11) % 17) as f32 / 16.0;
        let g = ((x * 7 + y * 29) % 23) as f32 / 22.0;
        Rgba::new([r * a, g * a, 0.3 * a, a])
    })
}

fn params(levels: usize, canvas: (usize, usize)) -> PatchParams {
    PatchParams {
        levels,
        fill_holes: false,
        canvas,
    }
}

fn assert_close(a: &ImageBuf<Rgba>, b: &ImageBuf<Rgba>, tol: f32) {
    assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    for (i, (p, q)) in a.pixels().iter().zip(b.pixels()).enumerate() {
        for c in 0..4 {
            assert!(
                (p.0[c] - q.0[c]).abs() <= tol,
                "pixel {i}: {p:?} vs {q:?}"
            );
        }
    }
}

#[test]
fn level_boxes_follow_halving_rule() {
    let boxes = level_boxes(PixelBox::new(3, 5, 10, 7), 3);
    assert_eq!(boxes.len(), 3);
    assert_eq!(boxes[0], PixelBox::new(3, 5, 10, 7));
    assert_eq!(boxes[1], PixelBox::from_corners(1, 2, 7, 7));
    assert_eq!(boxes[2], PixelBox::from_corners(0, 1, 4, 4));
}

#[test]
fn padded_box_grows_with_depth() {
    let bbox = PixelBox::new(10, 10, 8, 8);
    assert_eq!(padded_source_box(&level_boxes(bbox, 1)), bbox);
    let deep = padded_source_box(&level_boxes(bbox, 4));
    assert!(deep.contains_box(bbox));
    assert!(deep.x < bbox.x && deep.max_x() > bbox.max_x());
}

#[test]
fn single_source_round_trips() {
    let canvas = (30, 28);
    let src = FakeSource::new(textured(24, 20), 2, 3, 3, canvas);
    let out = blend_patch(PixelBox::new(0, 0, 30, 28), params(3, canvas), &[src]).unwrap();

    let expected = textured(24, 20).region(PixelBox::new(-2, -3, 30, 28));
    assert_close(&out, &expected, 1e-4);
}

#[test]
fn tiles_match_whole_patch() {
    let canvas = (32, 32);
    let sources = [FakeSource::new(textured(27, 25), 3, 4, 3, canvas)];
    let whole = blend_patch(PixelBox::new(0, 0, 32, 32), params(3, canvas), &sources).unwrap();

    let mut stitched = ImageBuf::<Rgba>::new(32, 32);
    for ty in 0..3 {
        for tx in 0..3 {
            let tile = PixelBox::new(tx * 11, ty * 11, 11, 11).intersect(PixelBox::new(0, 0, 32, 32));
            let patch = blend_patch(tile, params(3, canvas), &sources).unwrap();
            stitched.paste(&patch, tile.x, tile.y);
        }
    }
    assert_close(&whole, &stitched, 1e-5);
}

#[test]
fn no_sources_yield_transparent_patch() {
    let out = blend_patch::<Rgba, FakeSource>(PixelBox::new(0, 0, 4, 4), params(2, (4, 4)), &[])
        .unwrap();
    assert!(out.pixels().iter().all(|p| *p == Rgba::default()));
}

#[test]
fn draft_overlays_in_insertion_order() {
    let red = ImageBuf::from_fn(4, 4, |_, _| Rgba::new([1.0, 0.0, 0.0, 1.0]));
    let blue = ImageBuf::from_fn(4, 4, |_, _| Rgba::new([0.0, 0.0, 1.0, 1.0]));
    let sources = [
        FakeSource::new(red, 0, 0, 1, (6, 4)),
        FakeSource::new(blue, 2, 0, 1, (6, 4)),
    ];
    let out = draft_patch(PixelBox::new(1, 0, 5, 4), params(1, (6, 4)), &sources).unwrap();
    assert_eq!(out.get(0, 0), Rgba::new([1.0, 0.0, 0.0, 1.0]));
    assert_eq!(out.get(1, 2), Rgba::new([0.0, 0.0, 1.0, 1.0]));
    assert_eq!(out.get(4, 3), Rgba::new([0.0, 0.0, 1.0, 1.0]));
}

#[test]
fn draft_and_blend_agree_for_a_lone_source() {
    let canvas = (26, 22);
    let sources = [FakeSource::new(textured(20, 18), 3, 2, 3, canvas)];
    let bbox = PixelBox::new(0, 0, 26, 22);
    let draft = draft_patch(bbox, params(3, canvas), &sources).unwrap();
    let blend = blend_patch(bbox, params(3, canvas), &sources).unwrap();
    assert_close(&draft, &blend, 1e-4);
}
