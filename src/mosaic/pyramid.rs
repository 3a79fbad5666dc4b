use smallvec::SmallVec;

use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::{Pixel, unpremultiply};
use crate::mosaic::positioned::PositionedImage;

/// One level of a source's blend pyramid: masked band-pass detail plus the feathered mask.
#[derive(Clone, Debug, PartialEq)]
pub struct PyramidLevel<P> {
    /// `detail * mask` at this level (the plain image at the coarsest level).
    pub image: PositionedImage<P>,
    /// Ownership mask reduced to this level.
    pub mask: PositionedImage<f32>,
}

/// Laplacian blend pyramid of one source, finest level first.
#[derive(Clone, Debug, PartialEq)]
pub struct Pyramid<P> {
    levels: SmallVec<[PyramidLevel<P>; 8]>,
}

impl<P: Pixel> Pyramid<P> {
    /// Levels, finest first.
    pub fn levels(&self) -> &[PyramidLevel<P>] {
        &self.levels
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Heap size of all images and masks.
    pub fn size_bytes(&self) -> usize {
        self.levels
            .iter()
            .map(|l| l.image.size_bytes() + l.mask.size_bytes())
            .sum()
    }
}

/// Pyramid depth for a mosaic whose smallest source side is `mindim` pixels:
/// `floor(log2(mindim / 2)) - 1`, at least 1.
pub fn pyramid_levels(mindim: usize) -> usize {
    let half = mindim / 2;
    if half == 0 {
        return 1;
    }
    let log2 = (usize::BITS - 1 - half.leading_zeros()) as usize;
    log2.saturating_sub(1).max(1)
}

/// Declared cache size of a pyramid built from `source_bytes` of source pixels.
pub fn estimated_pyramid_bytes(source_bytes: usize) -> usize {
    source_bytes.saturating_mul(166) / 100
}

/// Build the blend pyramid of one source.
///
/// `placement` is the source's box in the mosaic frame and `canvas` the mosaic size. `mask` is
/// the binary ownership mask, sized like the source. Each level stores
/// `(level - expand(reduce(level))) * mask` with the reduced image unpremultiplied first, and the
/// coarsest level stores the image itself. With `fill_holes` the source is unpremultiplied up
/// front so transparent pixels do not darken their neighbours.
#[tracing::instrument(skip(source, placement, mask), fields(placement = %placement))]
pub fn build_pyramid<P: Pixel>(
    source: &ImageBuf<P>,
    placement: PixelBox,
    canvas: (usize, usize),
    mask: ImageBuf<f32>,
    levels: usize,
    fill_holes: bool,
) -> MosaicResult<Pyramid<P>> {
    if levels == 0 {
        return Err(MosaicError::validation("pyramid needs at least one level"));
    }
    if (mask.width(), mask.height()) != (source.width(), source.height()) {
        return Err(MosaicError::generation(format!(
            "mask is {}x{} but source is {}x{}",
            mask.width(),
            mask.height(),
            source.width(),
            source.height()
        )));
    }

    let mut image = source.clone();
    if fill_holes {
        image.map_in_place(unpremultiply);
    }
    let (cols, rows) = canvas;
    let mut high = PositionedImage::new(image, placement, cols, rows)?;
    let mut low = high.reduce();
    let mut mask = PositionedImage::new(mask, placement, cols, rows)?;

    let mut out = SmallVec::new();
    for level in 0..levels {
        if level > 0 {
            mask = mask.reduce();
        }
        let mut diff = if level + 1 < levels {
            let next = low.reduce();
            low.unpremultiply();
            let mut diff = std::mem::replace(&mut high, std::mem::replace(&mut low, next));
            diff.subtract_expanded(&high);
            diff
        } else {
            high.clone()
        };
        diff *= &mask;
        out.push(PyramidLevel {
            image: diff,
            mask: mask.clone(),
        });
    }

    let pyramid = Pyramid { levels: out };
    tracing::debug!(
        levels = pyramid.level_count(),
        bytes = pyramid.size_bytes(),
        "pyramid built"
    );
    Ok(pyramid)
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/pyramid.rs"]
mod tests;
