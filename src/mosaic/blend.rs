use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::PixelBox;
use crate::foundation::error::MosaicResult;
use crate::foundation::math::{checked_ratio, floor_div2};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::{Pixel, unpremultiply};
use crate::image::resample::expand2;
use crate::mosaic::positioned::PositionedImage;
use crate::mosaic::pyramid::Pyramid;

/// One positioned source as seen by the patch compositors.
///
/// Placements are in the composite's view frame.
pub trait PatchSource<P: Pixel>: Sync {
    /// Box the source covers.
    fn placement(&self) -> PixelBox;

    /// Whether the blend pyramid is already resident in memory.
    fn pyramid_resident(&self) -> bool;

    /// Blend pyramid of the source (may generate it).
    fn pyramid(&self) -> MosaicResult<Arc<Pyramid<P>>>;

    /// Alpha plane of the source, sized like the placement.
    fn alpha(&self) -> MosaicResult<Arc<ImageBuf<f32>>>;

    /// Raw source pixels of `local` (source-local coordinates).
    fn pixels(&self, local: PixelBox) -> MosaicResult<ImageBuf<P>>;
}

/// Settings shared by every patch of one composite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchParams {
    /// Pyramid depth.
    pub levels: usize,
    /// Divide the result by its own alpha instead of restoring source transparency.
    pub fill_holes: bool,
    /// Canvas size `(cols, rows)` of the view frame.
    pub canvas: (usize, usize),
}

/// Boxes a patch needs at every pyramid level, finest first.
pub fn level_boxes(bbox: PixelBox, levels: usize) -> SmallVec<[PixelBox; 8]> {
    let mut out = SmallVec::with_capacity(levels);
    let mut current = bbox;
    for _ in 0..levels {
        out.push(current);
        let next = current.reduced();
        debug_assert_eq!(next.x, floor_div2(current.x));
        debug_assert!(
            current.is_empty()
                || next.max_x()
                    == (current.width + current.x.rem_euclid(2)) / 2 + floor_div2(current.x) + 1
        );
        debug_assert!(
            current.is_empty()
                || next.max_y()
                    == (current.height + current.y.rem_euclid(2)) / 2 + floor_div2(current.y) + 1
        );
        current = next;
    }
    out
}

/// Finest-level box whose sources can influence any level of the patch.
///
/// Coarse levels reach further than the patch itself, so each level box is mapped back up
/// through [`PixelBox::expanded`] and the results are unioned.
pub fn padded_source_box(boxes: &[PixelBox]) -> PixelBox {
    let mut padded = PixelBox::default();
    for (level, bbox) in boxes.iter().enumerate() {
        let mut up = *bbox;
        for _ in 0..level {
            up = up.expanded();
        }
        padded = padded.grow(up);
    }
    padded
}

/// Per-level sums of masked detail and of mask weight for one patch.
struct Accumulator<P> {
    boxes: SmallVec<[PixelBox; 8]>,
    sums: Vec<ImageBuf<P>>,
    weights: Vec<ImageBuf<f32>>,
}

impl<P: Pixel> Accumulator<P> {
    fn new(boxes: SmallVec<[PixelBox; 8]>) -> Self {
        let sums = boxes.iter().map(|b| ImageBuf::for_box(*b)).collect();
        let weights = boxes.iter().map(|b| ImageBuf::for_box(*b)).collect();
        Self {
            boxes,
            sums,
            weights,
        }
    }

    fn add(&mut self, pyramid: &Pyramid<P>) {
        for (level, data) in pyramid.levels().iter().enumerate().take(self.boxes.len()) {
            let b = self.boxes[level];
            data.image.add_to_window(&mut self.sums[level], b.x, b.y, false);
            data.mask.add_to_window(&mut self.weights[level], b.x, b.y, false);
        }
    }

    /// Collapse coarsest to finest, renormalizing every level by its mask weight.
    fn collapse(self) -> ImageBuf<P> {
        let Self {
            boxes,
            sums,
            weights,
        } = self;
        let mut composite: Option<ImageBuf<P>> = None;
        for level in (0..boxes.len()).rev() {
            let mut ratio = normalized(&sums[level], &weights[level]);
            if let Some(coarse) = composite.take() {
                let up = expand2(&coarse, boxes[level + 1], boxes[level]);
                for (r, u) in ratio.pixels_mut().iter_mut().zip(up.pixels()) {
                    *r = r.add(*u);
                }
            }
            composite = Some(ratio);
        }
        composite.unwrap_or_else(|| ImageBuf::new(0, 0))
    }
}

fn normalized<P: Pixel>(sum: &ImageBuf<P>, weight: &ImageBuf<f32>) -> ImageBuf<P> {
    let data = sum
        .pixels()
        .iter()
        .zip(weight.pixels())
        .map(|(s, w)| match checked_ratio(1.0, *w) {
            Some(inv) => s.scale(inv),
            None => P::default(),
        })
        .collect();
    ImageBuf::from_raw_parts(sum.width(), sum.height(), data)
}

/// Blend every source that can influence `bbox` into a full-resolution patch.
///
/// Resident pyramids are accumulated first; each pyramid is released before the next is
/// fetched. Without `fill_holes` the result is rescaled so its alpha matches the largest alpha
/// any source has at each pixel; with it the result is divided by its own alpha.
pub fn blend_patch<P: Pixel, S: PatchSource<P>>(
    bbox: PixelBox,
    params: PatchParams,
    sources: &[S],
) -> MosaicResult<ImageBuf<P>> {
    let boxes = level_boxes(bbox, params.levels.max(1));
    let padded = padded_source_box(&boxes);

    let mut selected: Vec<&S> = sources
        .iter()
        .filter(|s| s.placement().intersects(padded))
        .collect();
    selected.sort_by_key(|s| !s.pyramid_resident());
    tracing::debug!(
        bbox = %bbox,
        padded = %padded,
        sources = selected.len(),
        "blending patch"
    );

    let mut acc = Accumulator::new(boxes);
    for source in &selected {
        let pyramid = source.pyramid()?;
        acc.add(&pyramid);
    }
    let mut out = acc.collapse();

    if params.fill_holes {
        out.map_in_place(unpremultiply);
    } else {
        let mut max_alpha = ImageBuf::<f32>::for_box(bbox);
        for source in selected.iter().filter(|s| s.placement().intersects(bbox)) {
            let alpha = source.alpha()?;
            max_alpha_into(&alpha, source.placement(), &mut max_alpha, bbox);
        }
        for (px, m) in out.pixels_mut().iter_mut().zip(max_alpha.pixels()) {
            *px = match checked_ratio(*m, px.alpha()) {
                Some(s) => px.scale(s),
                None => P::default(),
            };
        }
    }

    sanitize(&mut out);
    Ok(out)
}

/// Alpha-composite the raw pixels of every source over `bbox`, in insertion order.
pub fn draft_patch<P: Pixel, S: PatchSource<P>>(
    bbox: PixelBox,
    params: PatchParams,
    sources: &[S],
) -> MosaicResult<ImageBuf<P>> {
    let mut out = ImageBuf::for_box(bbox);
    for source in sources {
        let placement = source.placement();
        let overlap = placement.intersect(bbox);
        if overlap.is_empty() {
            continue;
        }
        let raw = source.pixels(overlap.translate(-placement.x, -placement.y))?;
        let (cols, rows) = params.canvas;
        PositionedImage::new(raw, overlap, cols, rows)?.add_to_window(
            &mut out,
            bbox.x,
            bbox.y,
            true,
        );
    }
    sanitize(&mut out);
    Ok(out)
}

fn max_alpha_into(
    alpha: &ImageBuf<f32>,
    placement: PixelBox,
    dest: &mut ImageBuf<f32>,
    bbox: PixelBox,
) {
    let overlap = placement.intersect(bbox);
    for y in overlap.y..overlap.max_y() {
        for x in overlap.x..overlap.max_x() {
            let a = alpha.get_or_zero(x - placement.x, y - placement.y);
            let d = dest.get_mut((x - bbox.x) as usize, (y - bbox.y) as usize);
            *d = d.max(a);
        }
    }
}

fn sanitize<P: Pixel>(img: &mut ImageBuf<P>) {
    img.map_in_place(|p| if p.is_finite() { p } else { P::default() });
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/blend.rs"]
mod tests;
