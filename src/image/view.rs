use std::sync::Arc;

use crate::foundation::core::PixelBox;
use crate::foundation::error::MosaicResult;
use crate::image::buffer::ImageBuf;
use crate::image::pixel::Pixel;

type RasterizeFn<P> = dyn Fn(PixelBox) -> MosaicResult<ImageBuf<P>> + Send + Sync;

/// Lazily evaluated `width x height` image.
///
/// A view is a pure function from a request box (in the view's own coordinates) to a pixel
/// buffer of that box's size. Pixels outside `[0, width) x [0, height)` read as zero. Views are
/// cheap to clone and compose by wrapping one closure in another.
#[derive(Clone)]
pub struct ImageView<P> {
    width: usize,
    height: usize,
    rasterize: Arc<RasterizeFn<P>>,
}

impl<P> std::fmt::Debug for ImageView<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageView")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl<P: Pixel> ImageView<P> {
    /// Wrap a rasterization function.
    ///
    /// `f` is called with boxes that may extend past the view; it must return a buffer of the
    /// requested size.
    pub fn new(
        width: usize,
        height: usize,
        f: impl Fn(PixelBox) -> MosaicResult<ImageBuf<P>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            width,
            height,
            rasterize: Arc::new(f),
        }
    }

    /// View over an in-memory buffer.
    pub fn from_buffer(buf: ImageBuf<P>) -> Self {
        let (width, height) = (buf.width(), buf.height());
        let buf = Arc::new(buf);
        Self::new(width, height, move |bbox| Ok(buf.region(bbox)))
    }

    /// Procedural view evaluating `f(x, y)` per pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        f: impl Fn(usize, usize) -> P + Send + Sync + 'static,
    ) -> Self {
        let bounds = PixelBox::from_size(width, height);
        Self::new(width, height, move |bbox| {
            let (w, h) = bbox.size();
            Ok(ImageBuf::from_fn(w, h, |x, y| {
                let (sx, sy) = (bbox.x + x as i32, bbox.y + y as i32);
                if bounds.contains(sx, sy) {
                    f(sx as usize, sy as usize)
                } else {
                    P::default()
                }
            }))
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// `PixelBox` of the whole view at the origin.
    pub fn bounds(&self) -> PixelBox {
        PixelBox::from_size(self.width, self.height)
    }

    /// Rasterize `bbox` (view coordinates) into a new buffer.
    pub fn rasterize(&self, bbox: PixelBox) -> MosaicResult<ImageBuf<P>> {
        (self.rasterize)(bbox)
    }

    /// Rasterize the whole view.
    pub fn rasterize_all(&self) -> MosaicResult<ImageBuf<P>> {
        self.rasterize(self.bounds())
    }

    /// Sub-view of `bbox`; the result's origin is `bbox`'s minimum corner.
    pub fn crop(&self, bbox: PixelBox) -> Self {
        let inner = self.clone();
        let (w, h) = bbox.size();
        Self::new(w, h, move |req| {
            let shifted = req.translate(bbox.x, bbox.y);
            let clipped = shifted.intersect(bbox);
            if clipped == shifted {
                return inner.rasterize(shifted);
            }
            let mut out = ImageBuf::for_box(req);
            if !clipped.is_empty() {
                let part = inner.rasterize(clipped)?;
                out.paste(&part, clipped.x - shifted.x, clipped.y - shifted.y);
            }
            Ok(out)
        })
    }

    /// Per-pixel transform of this view.
    pub fn map<Q: Pixel>(&self, f: impl Fn(P) -> Q + Send + Sync + 'static) -> ImageView<Q> {
        let inner = self.clone();
        ImageView::new(self.width, self.height, move |bbox| {
            Ok(inner.rasterize(bbox)?.map(&f))
        })
    }

    /// Alpha channel of this view (all ones for pixel types without alpha).
    pub fn alpha(&self) -> ImageView<f32> {
        self.map(|p| p.alpha())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/view.rs"]
mod tests;
