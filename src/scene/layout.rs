use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::cache::generation::GenerationCache;
use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::io::open_image;
use crate::image::pixel::Pixel;
use crate::mosaic::composite::{CompositeOpts, ImageComposite};
use crate::mosaic::masks::MaskStore;

/// One source image of a [`MosaicLayout`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayoutSource {
    /// Image file, relative to the layout file's directory.
    pub path: String,
    /// Column of the image's top-left pixel in the shared frame.
    pub x: i32,
    /// Row of the image's top-left pixel in the shared frame.
    pub y: i32,
}

/// JSON description of a mosaic: positioned sources plus optional frame and options.
///
/// ```json
/// { "sources": [{ "path": "tiles/a.png", "x": 0, "y": 0 }],
///   "bbox": { "x": 0, "y": 0, "width": 512, "height": 512 },
///   "opts": { "fill_holes": true } }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MosaicLayout {
    /// Sources in insertion order; earlier sources win mask ties.
    pub sources: Vec<LayoutSource>,
    /// Explicit view frame; defaults to the union of all placements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<PixelBox>,
    /// Composite options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<CompositeOpts>,
}

impl MosaicLayout {
    /// Parse and validate a layout document.
    pub fn from_json_str(s: &str) -> MosaicResult<Self> {
        let layout: Self = serde_json::from_str(s)
            .map_err(|e| MosaicError::serde(format!("parse layout JSON: {e}")))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Read, parse and validate a layout file.
    pub fn load(path: &Path) -> MosaicResult<Self> {
        let f = File::open(path).with_context(|| format!("open layout '{}'", path.display()))?;
        let layout: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            MosaicError::serde(format!("parse layout '{}': {e}", path.display()))
        })?;
        layout.validate()?;
        Ok(layout)
    }

    /// Check that the layout names at least one source and that every path is a clean
    /// relative path.
    pub fn validate(&self) -> MosaicResult<()> {
        if self.sources.is_empty() {
            return Err(MosaicError::validation("layout must list at least one source"));
        }
        for (i, src) in self.sources.iter().enumerate() {
            normalize_rel_path(&src.path).map_err(|e| {
                MosaicError::validation(format!("layout source {i} ('{}'): {e}", src.path))
            })?;
        }
        if let Some(bbox) = self.bbox
            && bbox.is_empty()
        {
            return Err(MosaicError::validation(format!(
                "layout bbox {bbox} is empty"
            )));
        }
        Ok(())
    }

    /// Open every source under `root`, insert it and prepare the composite.
    ///
    /// Sources are only probed for their dimensions here; pixels are decoded on demand through
    /// `cache`.
    pub fn build_composite<P: Pixel>(
        &self,
        root: &Path,
        cache: GenerationCache,
        masks: Arc<dyn MaskStore>,
    ) -> MosaicResult<ImageComposite<P>> {
        self.validate()?;
        let mut composite =
            ImageComposite::with_opts(cache, masks, self.opts.unwrap_or_default());
        for src in &self.sources {
            let rel = normalize_rel_path(&src.path)?;
            let view = open_image::<P>(root.join(&rel))?;
            composite.insert(view, src.x, src.y)?;
        }
        match self.bbox {
            Some(bbox) => composite.prepare_with_bbox(bbox)?,
            None => composite.prepare()?,
        }
        Ok(composite)
    }
}

/// Normalize a layout-relative path: `/` separators, no leading `/`, no `..`, `.` and empty
/// parts dropped.
pub fn normalize_rel_path(source: &str) -> MosaicResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(MosaicError::validation("source paths must be relative"));
    }
    if s.is_empty() {
        return Err(MosaicError::validation("source path must be non-empty"));
    }

    let mut parts = Vec::<&str>::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(MosaicError::validation(
                    "source paths must not contain '..'",
                ));
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(MosaicError::validation(
            "source path must contain a file name",
        ));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/scene/layout.rs"]
mod tests;
