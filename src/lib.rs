//! Orthomosaic composites many positioned images into one seamless picture.
//!
//! Sources are placed on a shared integer pixel frame and rendered lazily, patch by patch:
//!
//! - Register sources on an [`ImageComposite`] with [`ImageComposite::insert`]
//! - [`ImageComposite::prepare`] fixes the frame and computes per-source ownership masks
//! - [`ImageComposite::render`] rasterizes any patch, blending overlaps with Laplacian pyramids
//!   (or alpha-overlaying them in draft mode)
//!
//! All intermediates (decoded sources, alpha planes, distance transforms, pyramids) live in a
//! byte-budgeted [`GenerationCache`], so the working set stays bounded regardless of mosaic
//! size. [`render_tiled`] renders large regions tile by tile on a rayon pool, and
//! [`MosaicLayout`] describes a mosaic as JSON.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod cache;
pub(crate) mod image;
pub(crate) mod mosaic;
pub(crate) mod render;
pub(crate) mod scene;

pub use crate::foundation::core::PixelBox;
pub use crate::foundation::error::{MosaicError, MosaicResult};

pub use crate::cache::generation::{
    CacheHandle, CacheOpts, CacheStats, GenerationCache, Generator,
};
pub use crate::image::buffer::ImageBuf;
pub use crate::image::io::{
    decode_image, load_image, load_mask_png, open_image, save_image, save_mask_png,
};
pub use crate::image::pixel::{Gray, GrayAlpha, Pixel, Rgb, Rgba, over, unpremultiply};
pub use crate::image::resample::{expand2, reduce2};
pub use crate::image::view::ImageView;
pub use crate::mosaic::blend::{
    PatchParams, PatchSource, blend_patch, draft_patch, level_boxes, padded_source_box,
};
pub use crate::mosaic::composite::{CompositeOpts, ImageComposite};
pub use crate::mosaic::grassfire::grassfire;
pub use crate::mosaic::masks::{
    DirMaskStore, MaskStore, MemoryMaskStore, generate_masks, ownership_mask,
};
pub use crate::mosaic::positioned::PositionedImage;
pub use crate::mosaic::pyramid::{
    Pyramid, PyramidLevel, build_pyramid, estimated_pyramid_bytes, pyramid_levels,
};
pub use crate::render::tiles::{CancelToken, TileOpts, render_tiled, tile_grid};
pub use crate::scene::layout::{LayoutSource, MosaicLayout, normalize_rel_path};
