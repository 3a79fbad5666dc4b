use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use rayon::prelude::*;

use crate::foundation::core::{PixelBox, to_i32};
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::Pixel;
use crate::mosaic::composite::ImageComposite;

/// Tiling and threading controls for [`render_tiled`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TileOpts {
    /// Edge length of square tiles in pixels.
    pub tile_size: usize,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

impl Default for TileOpts {
    fn default() -> Self {
        Self {
            tile_size: 256,
            threads: None,
        }
    }
}

/// Shared flag a caller can raise to abort a tiled render.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; tiles not yet started are skipped.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Split `region` into row-major tiles of at most `tile_size x tile_size`.
pub fn tile_grid(region: PixelBox, tile_size: usize) -> MosaicResult<Vec<PixelBox>> {
    if tile_size == 0 {
        return Err(MosaicError::validation("tile_size must be >= 1"));
    }
    let step = to_i32(tile_size);
    let mut tiles = Vec::new();
    let mut y = region.y;
    while y < region.max_y() {
        let mut x = region.x;
        while x < region.max_x() {
            tiles.push(PixelBox::from_corners(
                x,
                y,
                x.saturating_add(step).min(region.max_x()),
                y.saturating_add(step).min(region.max_y()),
            ));
            x = x.saturating_add(step);
        }
        y = y.saturating_add(step);
    }
    Ok(tiles)
}

/// Render `region` of a prepared composite tile by tile on a dedicated thread pool.
///
/// The result equals a single [`ImageComposite::render`] of `region` up to floating-point
/// rounding. `cancel` is checked before each tile.
#[tracing::instrument(skip(composite, region, opts, cancel), fields(region = %region))]
pub fn render_tiled<P: Pixel>(
    composite: &ImageComposite<P>,
    region: PixelBox,
    opts: &TileOpts,
    cancel: &CancelToken,
) -> MosaicResult<ImageBuf<P>> {
    if cancel.is_cancelled() {
        return Err(MosaicError::Cancelled);
    }
    let tiles = tile_grid(region, opts.tile_size)?;
    let pool = build_thread_pool(opts.threads)?;

    let rendered = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| -> MosaicResult<(PixelBox, ImageBuf<P>)> {
                if cancel.is_cancelled() {
                    return Err(MosaicError::Cancelled);
                }
                Ok((*tile, composite.render(*tile)?))
            })
            .collect::<MosaicResult<Vec<_>>>()
    })?;

    let mut out = ImageBuf::for_box(region);
    for (tile, buf) in &rendered {
        out.paste(buf, tile.x - region.x, tile.y - region.y);
    }
    tracing::debug!(tiles = rendered.len(), "tiled render done");
    Ok(out)
}

fn build_thread_pool(threads: Option<usize>) -> MosaicResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MosaicError::validation(
            "render_tiled 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    Ok(builder.build().context("failed to build rayon thread pool")?)
}

#[cfg(test)]
#[path = "../../tests/unit/render/tiles.rs"]
mod tests;
