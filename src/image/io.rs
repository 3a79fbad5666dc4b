use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::core::{PixelBox, to_i32};
use crate::foundation::error::{MosaicError, MosaicResult};
use crate::foundation::math::{f32_to_unorm8, unorm8_to_f32};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::{Pixel, unpremultiply};
use crate::image::view::ImageView;

/// Decode an image file into premultiplied pixels of type `P`.
pub fn load_image<P: Pixel>(path: &Path) -> MosaicResult<ImageBuf<P>> {
    let dyn_img =
        image::open(path).with_context(|| format!("decode image '{}'", path.display()))?;
    Ok(rgba8_to_buf(dyn_img.to_rgba8()))
}

/// Decode an encoded image held in memory.
pub fn decode_image<P: Pixel>(bytes: &[u8]) -> MosaicResult<ImageBuf<P>> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Ok(rgba8_to_buf(dyn_img.to_rgba8()))
}

/// Disk-backed lazy view of an image file.
///
/// Only the header is read here. The file is decoded on every rasterization; keep the result in
/// a [`crate::GenerationCache`] entry to hold it resident.
pub fn open_image<P: Pixel>(path: impl Into<PathBuf>) -> MosaicResult<ImageView<P>> {
    let path = path.into();
    let (w, h) = image::image_dimensions(&path)
        .with_context(|| format!("read image header '{}'", path.display()))?;
    let (width, height) = (w as usize, h as usize);
    Ok(ImageView::new(width, height, move |bbox: PixelBox| {
        let buf = load_image::<P>(&path)?;
        if buf.width() != width || buf.height() != height {
            return Err(MosaicError::generation(format!(
                "image '{}' changed size on disk ({}x{} -> {}x{})",
                path.display(),
                width,
                height,
                buf.width(),
                buf.height()
            )));
        }
        if bbox == buf.bounds() {
            Ok(buf)
        } else {
            Ok(buf.region(bbox))
        }
    }))
}

/// Write `img` as a straight-alpha RGBA8 PNG, creating parent directories as needed.
pub fn save_image<P: Pixel>(path: &Path, img: &ImageBuf<P>) -> MosaicResult<()> {
    let mut data = Vec::with_capacity(img.pixels().len() * 4);
    for px in img.pixels() {
        let straight = unpremultiply(*px).to_rgba();
        data.extend_from_slice(&[
            f32_to_unorm8(straight[0]),
            f32_to_unorm8(straight[1]),
            f32_to_unorm8(straight[2]),
            f32_to_unorm8(px.alpha()),
        ]);
    }
    write_png(path, &data, img, image::ColorType::Rgba8)
}

/// Write a single-channel mask as an 8-bit grayscale PNG.
pub fn save_mask_png(path: &Path, mask: &ImageBuf<f32>) -> MosaicResult<()> {
    let data: Vec<u8> = mask.pixels().iter().map(|v| f32_to_unorm8(*v)).collect();
    write_png(path, &data, mask, image::ColorType::L8)
}

/// Read a grayscale PNG written by [`save_mask_png`] back into `[0, 1]` values.
pub fn load_mask_png(path: &Path) -> MosaicResult<ImageBuf<f32>> {
    let dyn_img =
        image::open(path).with_context(|| format!("decode mask '{}'", path.display()))?;
    let luma = dyn_img.to_luma8();
    let (w, h) = luma.dimensions();
    let data = luma.into_raw().into_iter().map(unorm8_to_f32).collect();
    ImageBuf::from_vec(w as usize, h as usize, data)
}

fn rgba8_to_buf<P: Pixel>(rgba: image::RgbaImage) -> ImageBuf<P> {
    let (w, h) = rgba.dimensions();
    let data = rgba
        .pixels()
        .map(|p| {
            let a = unorm8_to_f32(p.0[3]);
            P::from_rgba([
                unorm8_to_f32(p.0[0]) * a,
                unorm8_to_f32(p.0[1]) * a,
                unorm8_to_f32(p.0[2]) * a,
                a,
            ])
        })
        .collect();
    ImageBuf::from_raw_parts(w as usize, h as usize, data)
}

fn write_png<P: Pixel>(
    path: &Path,
    data: &[u8],
    img: &ImageBuf<P>,
    color: image::ColorType,
) -> MosaicResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let (w, h) = (to_i32(img.width()) as u32, to_i32(img.height()) as u32);
    image::save_buffer_with_format(path, data, w, h, color, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/image/io.rs"]
mod tests;
