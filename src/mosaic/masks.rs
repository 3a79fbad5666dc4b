use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use rayon::prelude::*;

use crate::foundation::core::PixelBox;
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::image::buffer::ImageBuf;
use crate::image::io::{load_mask_png, save_mask_png};

/// Persistence for per-source ownership masks, keyed by insertion index.
pub trait MaskStore: Send + Sync {
    /// Store the mask of source `index`, replacing any previous one.
    fn save(&self, index: usize, mask: &ImageBuf<f32>) -> MosaicResult<()>;

    /// Load the mask of source `index`.
    fn load(&self, index: usize) -> MosaicResult<ImageBuf<f32>>;
}

/// Masks stored as `mask.<index>.png` files in a working directory.
#[derive(Clone, Debug)]
pub struct DirMaskStore {
    dir: PathBuf,
}

impl DirMaskStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> MosaicResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create mask dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the mask of source `index`.
    pub fn mask_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("mask.{index}.png"))
    }
}

impl MaskStore for DirMaskStore {
    fn save(&self, index: usize, mask: &ImageBuf<f32>) -> MosaicResult<()> {
        save_mask_png(&self.mask_path(index), mask)
    }

    fn load(&self, index: usize) -> MosaicResult<ImageBuf<f32>> {
        let path = self.mask_path(index);
        if !path.is_file() {
            return Err(MosaicError::generation(format!(
                "mask for source {index} not found at '{}'",
                path.display()
            )));
        }
        load_mask_png(&path)
    }
}

/// In-process mask store.
#[derive(Debug, Default)]
pub struct MemoryMaskStore {
    masks: Mutex<HashMap<usize, Arc<ImageBuf<f32>>>>,
}

impl MemoryMaskStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored masks.
    pub fn len(&self) -> usize {
        self.masks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no mask has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MaskStore for MemoryMaskStore {
    fn save(&self, index: usize, mask: &ImageBuf<f32>) -> MosaicResult<()> {
        self.masks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, Arc::new(mask.clone()));
        Ok(())
    }

    fn load(&self, index: usize) -> MosaicResult<ImageBuf<f32>> {
        let masks = self.masks.lock().unwrap_or_else(PoisonError::into_inner);
        masks
            .get(&index)
            .map(|m| (**m).clone())
            .ok_or_else(|| MosaicError::generation(format!("mask for source {index} not found")))
    }
}

/// Binary ownership mask of source `index`.
///
/// Starts from the source's grassfire plane and clears every pixel where an overlapping source
/// is strictly more interior, or equally interior and inserted earlier. Surviving pixels become
/// 1, the rest 0. `grassfire(i)` yields the plane of source `i`, sized like `placements[i]`.
pub fn ownership_mask<F>(
    index: usize,
    placements: &[PixelBox],
    grassfire: &F,
) -> MosaicResult<ImageBuf<f32>>
where
    F: Fn(usize) -> MosaicResult<Arc<ImageBuf<f32>>>,
{
    let p1 = placements
        .get(index)
        .copied()
        .ok_or_else(|| MosaicError::validation(format!("no source with index {index}")))?;
    let g1 = grassfire(index)?;
    check_plane(index, p1, &g1)?;
    let mut mask = (*g1).clone();

    for (other, &p2) in placements.iter().enumerate() {
        if other == index || !p1.intersects(p2) {
            continue;
        }
        let g2 = grassfire(other)?;
        check_plane(other, p2, &g2)?;
        let overlap = p1.intersect(p2);
        for y in overlap.y..overlap.max_y() {
            for x in overlap.x..overlap.max_x() {
                let (x1, y1) = ((x - p1.x) as usize, (y - p1.y) as usize);
                let mine = g1.get(x1, y1);
                let theirs = g2.get((x - p2.x) as usize, (y - p2.y) as usize);
                if theirs > mine || (theirs == mine && other < index) {
                    mask.set(x1, y1, 0.0);
                }
            }
        }
    }

    mask.map_in_place(|v| if v > 0.0 { 1.0 } else { 0.0 });
    Ok(mask)
}

/// Compute and store the ownership mask of every source, in parallel.
#[tracing::instrument(skip(placements, grassfire, store), fields(sources = placements.len()))]
pub fn generate_masks<F>(
    placements: &[PixelBox],
    grassfire: F,
    store: &dyn MaskStore,
) -> MosaicResult<()>
where
    F: Fn(usize) -> MosaicResult<Arc<ImageBuf<f32>>> + Sync,
{
    tracing::info!("generating ownership masks");
    (0..placements.len()).into_par_iter().try_for_each(|i| {
        let mask = ownership_mask(i, placements, &grassfire)?;
        store.save(i, &mask)
    })?;
    tracing::info!("ownership masks done");
    Ok(())
}

fn check_plane(index: usize, placement: PixelBox, plane: &ImageBuf<f32>) -> MosaicResult<()> {
    if placement.size() != (plane.width(), plane.height()) {
        return Err(MosaicError::generation(format!(
            "grassfire plane of source {index} is {}x{}, expected {placement}",
            plane.width(),
            plane.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/masks.rs"]
mod tests;
