use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::{Pixel, over, unpremultiply};
use crate::image::resample::{expand2, reduce2};

/// Pixel buffer placed inside a virtual canvas at one pyramid level.
///
/// `placement` locates `image`'s top-left pixel within the `canvas_cols x canvas_rows` canvas;
/// its size always equals the buffer's.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionedImage<P> {
    image: ImageBuf<P>,
    placement: PixelBox,
    canvas_cols: usize,
    canvas_rows: usize,
}

impl<P: Pixel> PositionedImage<P> {
    /// Place `image` at `placement` in a `canvas_cols x canvas_rows` canvas.
    pub fn new(
        image: ImageBuf<P>,
        placement: PixelBox,
        canvas_cols: usize,
        canvas_rows: usize,
    ) -> MosaicResult<Self> {
        if placement.size() != (image.width(), image.height()) {
            return Err(MosaicError::validation(format!(
                "placement {placement} does not match a {}x{} image",
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            image,
            placement,
            canvas_cols,
            canvas_rows,
        })
    }

    /// Pixel data.
    pub fn image(&self) -> &ImageBuf<P> {
        &self.image
    }

    /// Location of the pixel data in the canvas.
    pub fn placement(&self) -> PixelBox {
        self.placement
    }

    /// Canvas size `(cols, rows)` at this level.
    pub fn canvas(&self) -> (usize, usize) {
        (self.canvas_cols, self.canvas_rows)
    }

    /// Heap size of the pixel data.
    pub fn size_bytes(&self) -> usize {
        self.image.size_bytes()
    }

    /// Blur and subsample to the next pyramid level.
    ///
    /// The result covers `placement.reduced()`, which keeps every level aligned with the one
    /// above it; the canvas halves, rounding up.
    pub fn reduce(&self) -> Self {
        let (image, placement) = reduce2(&self.image, self.placement);
        Self {
            image,
            placement,
            canvas_cols: self.canvas_cols.div_ceil(2),
            canvas_rows: self.canvas_rows.div_ceil(2),
        }
    }

    /// Divide color channels by alpha in place.
    pub fn unpremultiply(&mut self) {
        self.image.map_in_place(unpremultiply);
    }

    /// Add this image into a canvas-sized `dest` at its placement.
    pub fn add_to(&self, dest: &mut ImageBuf<P>) {
        self.add_to_window(dest, 0, 0, false);
    }

    /// Add (or, with `overlay`, alpha-composite) into `dest`, whose top-left pixel sits at
    /// `(ox, oy)` in canvas coordinates.
    ///
    /// Only the overlap of `placement` and the window is touched; an empty overlap is a no-op.
    pub fn add_to_window(&self, dest: &mut ImageBuf<P>, ox: i32, oy: i32, overlay: bool) {
        let window = PixelBox::from_size(dest.width(), dest.height()).translate(ox, oy);
        let overlap = self.placement.intersect(window);
        if overlap.is_empty() {
            return;
        }
        for y in overlap.y..overlap.max_y() {
            let sy = (y - self.placement.y) as usize;
            let dy = (y - oy) as usize;
            for x in overlap.x..overlap.max_x() {
                let src = self.image.get((x - self.placement.x) as usize, sy);
                let dst = dest.get_mut((x - ox) as usize, dy);
                *dst = if overlay { over(*dst, src) } else { dst.add(src) };
            }
        }
    }

    /// Subtract the 2x bilinear expansion of the next-coarser level.
    ///
    /// Samples outside `coarse`'s support count as zero.
    pub fn subtract_expanded(&mut self, coarse: &Self) {
        let expanded = expand2(&coarse.image, coarse.placement, self.placement);
        for (p, e) in self.image.pixels_mut().iter_mut().zip(expanded.pixels()) {
            *p = p.sub(*e);
        }
    }

    /// Multiply by an aligned mask; pixels outside the mask's support become zero.
    pub fn mul_mask(&mut self, mask: &PositionedImage<f32>) {
        let (w, h) = (self.image.width(), self.image.height());
        let dx = self.placement.x - mask.placement.x;
        let dy = self.placement.y - mask.placement.y;
        for y in 0..h {
            for x in 0..w {
                let m = mask.image.get_or_zero(x as i32 + dx, y as i32 + dy);
                let px = self.image.get_mut(x, y);
                *px = px.scale(m);
            }
        }
    }
}

impl<P: Pixel> std::ops::MulAssign<&PositionedImage<f32>> for PositionedImage<P> {
    fn mul_assign(&mut self, mask: &PositionedImage<f32>) {
        self.mul_mask(mask);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/positioned.rs"]
mod tests;
