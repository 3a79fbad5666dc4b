use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::pixel::Pixel;

/// Owned, row-major 2D pixel buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuf<P> {
    width: usize,
    height: usize,
    data: Vec<P>,
}

impl<P: Pixel> ImageBuf<P> {
    /// Zero-filled buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![P::default(); width.saturating_mul(height)],
        }
    }

    /// Zero-filled buffer sized like `bbox`.
    pub fn for_box(bbox: PixelBox) -> Self {
        let (w, h) = bbox.size();
        Self::new(w, h)
    }

    /// Wrap existing row-major pixel data.
    pub fn from_vec(width: usize, height: usize, data: Vec<P>) -> MosaicResult<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| MosaicError::validation("image buffer size overflow"))?;
        if data.len() != expected {
            return Err(MosaicError::validation(format!(
                "image buffer expects {expected} pixels for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub(crate) fn from_raw_parts(width: usize, height: usize, data: Vec<P>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> P) -> Self {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// `PixelBox` of the buffer at the origin.
    pub fn bounds(&self) -> PixelBox {
        PixelBox::from_size(self.width, self.height)
    }

    /// Approximate heap size of the pixel data.
    pub fn size_bytes(&self) -> usize {
        self.data.len().saturating_mul(std::mem::size_of::<P>())
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> P {
        self.data[y * self.width + x]
    }

    /// Pixel at signed coordinates, zero outside the buffer.
    pub fn get_or_zero(&self, x: i32, y: i32) -> P {
        if x < 0 || y < 0 {
            return P::default();
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return P::default();
        }
        self.data[y * self.width + x]
    }

    /// Mutable pixel at `(x, y)`. Panics when out of bounds.
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut P {
        &mut self.data[y * self.width + x]
    }

    /// Overwrite the pixel at `(x, y)`. Panics when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, px: P) {
        self.data[y * self.width + x] = px;
    }

    /// All pixels in row-major order.
    pub fn pixels(&self) -> &[P] {
        &self.data
    }

    /// Mutable pixels in row-major order.
    pub fn pixels_mut(&mut self) -> &mut [P] {
        &mut self.data
    }

    /// One row of pixels.
    pub fn row(&self, y: usize) -> &[P] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Consume into raw row-major data.
    pub fn into_vec(self) -> Vec<P> {
        self.data
    }

    /// Copy out `region` (in buffer coordinates); pixels outside the buffer read as zero.
    pub fn region(&self, region: PixelBox) -> Self {
        let (w, h) = region.size();
        let mut out = Self::new(w, h);
        let inside = region.intersect(self.bounds());
        if inside.is_empty() {
            return out;
        }
        let (iw, _) = inside.size();
        let dx = (inside.x - region.x) as usize;
        for y in inside.y..inside.max_y() {
            let src_start = y as usize * self.width + inside.x as usize;
            let dst_start = (y - region.y) as usize * w + dx;
            out.data[dst_start..dst_start + iw]
                .copy_from_slice(&self.data[src_start..src_start + iw]);
        }
        out
    }

    /// Copy `src` into this buffer with its top-left pixel at `(x, y)`, clipping to bounds.
    pub fn paste(&mut self, src: &Self, x: i32, y: i32) {
        let placed = src.bounds().translate(x, y);
        let inside = placed.intersect(self.bounds());
        if inside.is_empty() {
            return;
        }
        let (iw, _) = inside.size();
        for row in inside.y..inside.max_y() {
            let src_start = (row - y) as usize * src.width + (inside.x - x) as usize;
            let dst_start = row as usize * self.width + inside.x as usize;
            self.data[dst_start..dst_start + iw]
                .copy_from_slice(&src.data[src_start..src_start + iw]);
        }
    }

    /// Apply `f` to every pixel, producing a buffer of another pixel type.
    pub fn map<Q: Pixel>(&self, f: impl Fn(P) -> Q) -> ImageBuf<Q> {
        ImageBuf {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&p| f(p)).collect(),
        }
    }

    /// Apply `f` to every pixel in place.
    pub fn map_in_place(&mut self, f: impl Fn(P) -> P) {
        for p in &mut self.data {
            *p = f(*p);
        }
    }

    /// Alpha plane of the buffer (all ones for pixel types without alpha).
    pub fn alpha_plane(&self) -> ImageBuf<f32> {
        self.map(|p| p.alpha())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/buffer.rs"]
mod tests;
