use std::sync::{Arc, OnceLock};

use crate::cache::generation::{CacheHandle, CacheStats, GenerationCache, Generator};
use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::Pixel;
use crate::image::view::ImageView;
use crate::mosaic::blend::{PatchParams, PatchSource, blend_patch, draft_patch};
use crate::mosaic::grassfire::grassfire;
use crate::mosaic::masks::{MaskStore, generate_masks};
use crate::mosaic::pyramid::{Pyramid, build_pyramid, estimated_pyramid_bytes, pyramid_levels};

/// Render and mask options of an [`ImageComposite`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeOpts {
    /// Alpha-overlay sources in insertion order instead of pyramid blending.
    pub draft_mode: bool,
    /// Treat transparent source pixels as holes to fill from neighbouring data.
    pub fill_holes: bool,
    /// Use the masks already in the mask store instead of generating them in `prepare`.
    pub reuse_masks: bool,
}

#[derive(Clone, Copy, Debug)]
struct Geometry {
    view_bbox: PixelBox,
    levels: usize,
    fill_holes: bool,
}

struct SourceGen<P> {
    view: ImageView<P>,
}

impl<P: Pixel> Generator for SourceGen<P> {
    type Value = ImageBuf<P>;

    fn size_bytes(&self) -> usize {
        plane_bytes::<P>(self.view.width(), self.view.height())
    }

    fn generate(&self) -> MosaicResult<ImageBuf<P>> {
        let buf = self.view.rasterize_all()?;
        if (buf.width(), buf.height()) != (self.view.width(), self.view.height()) {
            return Err(MosaicError::generation(format!(
                "source view rasterized to {}x{}, expected {}x{}",
                buf.width(),
                buf.height(),
                self.view.width(),
                self.view.height()
            )));
        }
        Ok(buf)
    }
}

struct AlphaGen<P: Pixel> {
    source: CacheHandle<SourceGen<P>>,
}

impl<P: Pixel> Generator for AlphaGen<P> {
    type Value = ImageBuf<f32>;

    fn size_bytes(&self) -> usize {
        let view = &self.source.generator().view;
        plane_bytes::<f32>(view.width(), view.height())
    }

    fn generate(&self) -> MosaicResult<ImageBuf<f32>> {
        let alpha = self.source.access()?.alpha_plane();
        self.source.deprioritize();
        Ok(alpha)
    }
}

struct GrassfireGen<P: Pixel> {
    alpha: CacheHandle<AlphaGen<P>>,
}

impl<P: Pixel> Generator for GrassfireGen<P> {
    type Value = ImageBuf<f32>;

    fn size_bytes(&self) -> usize {
        self.alpha.size_bytes()
    }

    fn generate(&self) -> MosaicResult<ImageBuf<f32>> {
        let alpha = self.alpha.access()?;
        Ok(grassfire(&alpha))
    }
}

struct PyramidGen<P: Pixel> {
    index: usize,
    placement: PixelBox,
    source: CacheHandle<SourceGen<P>>,
    masks: Arc<dyn MaskStore>,
    geometry: Arc<OnceLock<Geometry>>,
}

impl<P: Pixel> Generator for PyramidGen<P> {
    type Value = Pyramid<P>;

    fn size_bytes(&self) -> usize {
        estimated_pyramid_bytes(self.source.size_bytes())
    }

    fn generate(&self) -> MosaicResult<Pyramid<P>> {
        let geo = self
            .geometry
            .get()
            .ok_or_else(|| MosaicError::validation("composite is not prepared"))?;
        let source = self.source.access()?;
        self.source.deprioritize();
        let mask = self.masks.load(self.index)?;
        let view = geo.view_bbox;
        build_pyramid(
            &source,
            self.placement.translate(-view.x, -view.y),
            view.size(),
            mask,
            geo.levels,
            geo.fill_holes,
        )
    }
}

fn plane_bytes<Q>(width: usize, height: usize) -> usize {
    width
        .saturating_mul(height)
        .saturating_mul(std::mem::size_of::<Q>())
}

struct SourceRecord<P: Pixel> {
    placement: PixelBox,
    source: CacheHandle<SourceGen<P>>,
    alpha: CacheHandle<AlphaGen<P>>,
    grassfire: CacheHandle<GrassfireGen<P>>,
    pyramid: CacheHandle<PyramidGen<P>>,
}

/// A source record seen from the composite's view frame.
struct ViewSource<'a, P: Pixel> {
    record: &'a SourceRecord<P>,
    placement: PixelBox,
}

impl<P: Pixel> PatchSource<P> for ViewSource<'_, P> {
    fn placement(&self) -> PixelBox {
        self.placement
    }

    fn pyramid_resident(&self) -> bool {
        self.record.pyramid.is_resident()
    }

    fn pyramid(&self) -> MosaicResult<Arc<Pyramid<P>>> {
        self.record.pyramid.access()
    }

    fn alpha(&self) -> MosaicResult<Arc<ImageBuf<f32>>> {
        self.record.alpha.access()
    }

    fn pixels(&self, local: PixelBox) -> MosaicResult<ImageBuf<P>> {
        Ok(self.record.source.access()?.region(local))
    }
}

/// Lazily rendered mosaic of positioned source images.
///
/// Sources are registered with [`ImageComposite::insert`]; nothing is computed until
/// [`ImageComposite::prepare`] fixes the view frame and pyramid depth and generates the
/// ownership masks. [`ImageComposite::render`] then composites any patch of the view, pulling
/// sources, alpha planes and pyramids through the [`GenerationCache`] so memory stays bounded.
///
/// Render coordinates are relative to [`ImageComposite::view_bbox`]: pixel `(0, 0)` is the view
/// box's minimum corner.
pub struct ImageComposite<P: Pixel> {
    cache: GenerationCache,
    masks: Arc<dyn MaskStore>,
    opts: CompositeOpts,
    sources: Vec<SourceRecord<P>>,
    view_bbox: PixelBox,
    data_bbox: PixelBox,
    mindim: usize,
    geometry: Arc<OnceLock<Geometry>>,
}

impl<P: Pixel> std::fmt::Debug for ImageComposite<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageComposite")
            .field("sources", &self.sources.len())
            .field("view_bbox", &self.view_bbox)
            .field("opts", &self.opts)
            .field("levels", &self.levels())
            .finish_non_exhaustive()
    }
}

impl<P: Pixel> ImageComposite<P> {
    /// Empty composite backed by `cache`, persisting masks to `masks`.
    pub fn new(cache: GenerationCache, masks: Arc<dyn MaskStore>) -> Self {
        Self::with_opts(cache, masks, CompositeOpts::default())
    }

    /// Empty composite with explicit options.
    pub fn with_opts(cache: GenerationCache, masks: Arc<dyn MaskStore>, opts: CompositeOpts) -> Self {
        Self {
            cache,
            masks,
            opts,
            sources: Vec::new(),
            view_bbox: PixelBox::default(),
            data_bbox: PixelBox::default(),
            mindim: usize::MAX,
            geometry: Arc::new(OnceLock::new()),
        }
    }

    /// Current options.
    pub fn opts(&self) -> CompositeOpts {
        self.opts
    }

    /// Switch between draft (alpha-over) and blend rendering.
    ///
    /// Blend rendering needs masks, so a composite prepared in draft mode cannot switch to blend
    /// mode unless the mask store already holds them.
    pub fn set_draft_mode(&mut self, draft: bool) {
        self.opts.draft_mode = draft;
    }

    /// Enable hole filling. Takes effect at [`ImageComposite::prepare`].
    pub fn set_fill_holes(&mut self, fill_holes: bool) {
        self.opts.fill_holes = fill_holes;
    }

    /// Reuse masks already in the mask store. Takes effect at [`ImageComposite::prepare`].
    pub fn set_reuse_masks(&mut self, reuse: bool) {
        self.opts.reuse_masks = reuse;
    }

    /// Register `source` with its top-left pixel at `(x, y)` in the shared frame.
    ///
    /// Returns the source's insertion index, which also keys its mask.
    pub fn insert(&mut self, source: ImageView<P>, x: i32, y: i32) -> MosaicResult<usize> {
        if self.is_prepared() {
            return Err(MosaicError::validation(
                "sources cannot be inserted after prepare",
            ));
        }
        let placement = source.bounds().translate(x, y);
        if placement.is_empty() {
            return Err(MosaicError::validation(format!(
                "source at ({x}, {y}) has no pixels"
            )));
        }

        let index = self.sources.len();
        let (w, h) = placement.size();
        let source = self.cache.insert(SourceGen { view: source });
        let alpha = self.cache.insert(AlphaGen {
            source: source.clone(),
        });
        let grassfire = self.cache.insert(GrassfireGen {
            alpha: alpha.clone(),
        });
        let pyramid = self.cache.insert(PyramidGen {
            index,
            placement,
            source: source.clone(),
            masks: Arc::clone(&self.masks),
            geometry: Arc::clone(&self.geometry),
        });
        self.sources.push(SourceRecord {
            placement,
            source,
            alpha,
            grassfire,
            pyramid,
        });

        self.view_bbox = self.view_bbox.grow(placement);
        self.data_bbox = self.data_bbox.grow(placement);
        self.mindim = self.mindim.min(w.min(h));
        tracing::debug!(index, placement = %placement, "source inserted");
        Ok(index)
    }

    /// Fix the view frame to the union of all placements, pick the pyramid depth and generate
    /// ownership masks (unless in draft mode or reusing masks).
    pub fn prepare(&mut self) -> MosaicResult<()> {
        self.prepare_inner(None)
    }

    /// Like [`ImageComposite::prepare`] but with an explicit view frame `total`.
    pub fn prepare_with_bbox(&mut self, total: PixelBox) -> MosaicResult<()> {
        self.prepare_inner(Some(total))
    }

    #[tracing::instrument(skip(self), fields(sources = self.sources.len()))]
    fn prepare_inner(&mut self, total: Option<PixelBox>) -> MosaicResult<()> {
        if self.is_prepared() {
            return Err(MosaicError::validation("composite is already prepared"));
        }
        if self.sources.is_empty() {
            return Err(MosaicError::validation("composite has no sources"));
        }
        let view_bbox = match total {
            Some(t) if t.is_empty() => {
                return Err(MosaicError::validation(format!(
                    "explicit composite bbox {t} is empty"
                )));
            }
            Some(t) => t,
            None => self.view_bbox,
        };
        let geometry = Geometry {
            view_bbox,
            levels: pyramid_levels(self.mindim),
            fill_holes: self.opts.fill_holes,
        };

        if !self.opts.draft_mode && !self.opts.reuse_masks {
            let sources = &self.sources;
            let placements: Vec<PixelBox> = sources.iter().map(|s| s.placement).collect();
            generate_masks(&placements, |i| sources[i].grassfire.access(), &*self.masks)?;
            for s in sources {
                s.grassfire.deprioritize();
            }
        }

        self.view_bbox = view_bbox;
        self.geometry
            .set(geometry)
            .map_err(|_| MosaicError::validation("composite is already prepared"))?;
        tracing::info!(
            view_bbox = %view_bbox,
            levels = geometry.levels,
            "composite prepared"
        );
        Ok(())
    }

    /// Whether [`ImageComposite::prepare`] has completed.
    pub fn is_prepared(&self) -> bool {
        self.geometry.get().is_some()
    }

    /// Number of inserted sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Placement of source `index` in the shared frame.
    pub fn source_placement(&self, index: usize) -> Option<PixelBox> {
        self.sources.get(index).map(|s| s.placement)
    }

    /// Externally visible frame, in shared coordinates.
    pub fn view_bbox(&self) -> PixelBox {
        self.view_bbox
    }

    /// Tight union of all source placements.
    pub fn bbox(&self) -> PixelBox {
        self.data_bbox
    }

    /// Width of the view.
    pub fn cols(&self) -> usize {
        self.view_bbox.size().0
    }

    /// Height of the view.
    pub fn rows(&self) -> usize {
        self.view_bbox.size().1
    }

    /// Pyramid depth, once prepared.
    pub fn levels(&self) -> Option<usize> {
        self.geometry.get().map(|g| g.levels)
    }

    /// The backing cache.
    pub fn cache(&self) -> &GenerationCache {
        &self.cache
    }

    /// Counters of the backing cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Composite the patch `bbox` (view coordinates).
    #[tracing::instrument(skip(self, bbox), fields(bbox = %bbox))]
    pub fn render(&self, bbox: PixelBox) -> MosaicResult<ImageBuf<P>> {
        let geo = self
            .geometry
            .get()
            .ok_or_else(|| MosaicError::validation("render called before prepare"))?;
        let (vx, vy) = (geo.view_bbox.x, geo.view_bbox.y);
        let sources: Vec<ViewSource<'_, P>> = self
            .sources
            .iter()
            .map(|record| ViewSource {
                record,
                placement: record.placement.translate(-vx, -vy),
            })
            .collect();
        let params = PatchParams {
            levels: geo.levels,
            fill_holes: geo.fill_holes,
            canvas: geo.view_bbox.size(),
        };
        if self.opts.draft_mode {
            draft_patch(bbox, params, &sources)
        } else {
            blend_patch(bbox, params, &sources)
        }
    }

    /// Single-pixel access is not supported; render a patch instead.
    pub fn pixel(&self, x: i32, y: i32) -> MosaicResult<P> {
        Err(MosaicError::unsupported(format!(
            "pixel ({x}, {y}): composites only rasterize whole patches; use render()"
        )))
    }

    /// The prepared composite as a lazy view for further composition.
    pub fn into_view(self) -> MosaicResult<ImageView<P>> {
        if !self.is_prepared() {
            return Err(MosaicError::validation(
                "composite must be prepared before it can be viewed",
            ));
        }
        let (w, h) = (self.cols(), self.rows());
        let this = Arc::new(self);
        Ok(ImageView::new(w, h, move |bbox| this.render(bbox)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/composite.rs"]
mod tests;
