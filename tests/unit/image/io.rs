use std::io::Cursor;

use super::*;
use crate::image::pixel::Rgba;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "orthomosaic_io_{name}_{}_{}",
        std::process::id(),
        nanos
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn decode_image_premultiplies() {
    let img = image::RgbaImage::from_raw(1, 1, vec![255u8, 0, 102, 128]).unwrap();
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let buf = decode_image::<Rgba>(&bytes).unwrap();
    let px = buf.get(0, 0).0;
    let a = 128.0 / 255.0;
    assert!((px[0] - a).abs() < 1e-6);
    assert_eq!(px[1], 0.0);
    assert!((px[2] - 0.4 * a).abs() < 1e-6);
    assert!((px[3] - a).abs() < 1e-6);
}

#[test]
fn save_then_load_rgba_round_trips_within_quantization() {
    let dir = temp_dir("rgba");
    let path = dir.join("nested/out.png");
    let src = ImageBuf::from_fn(3, 2, |x, y| {
        let a = if x == 0 { 0.5 } else { 1.0 };
        Rgba::new([0.2 * a, (y as f32) * 0.6 * a, 0.8 * a, a])
    });
    save_image(&path, &src).unwrap();

    let back = load_image::<Rgba>(&path).unwrap();
    assert_eq!((back.width(), back.height()), (3, 2));
    for (a, b) in src.pixels().iter().zip(back.pixels()) {
        for c in 0..4 {
            assert!((a.0[c] - b.0[c]).abs() < 1.0 / 255.0 + 1e-6, "{a:?} vs {b:?}");
        }
    }
}

#[test]
fn mask_png_round_trips_binary_values() {
    let dir = temp_dir("mask");
    let path = dir.join("mask.0.png");
    let mask = ImageBuf::from_fn(4, 3, |x, y| if (x + y) % 2 == 0 { 1.0f32 } else { 0.0 });
    save_mask_png(&path, &mask).unwrap();
    assert_eq!(load_mask_png(&path).unwrap(), mask);
}

#[test]
fn open_image_reads_header_and_decodes_lazily() {
    let dir = temp_dir("lazy");
    let path = dir.join("src.png");
    let src = ImageBuf::from_fn(4, 4, |x, _| Rgba::new([x as f32 / 3.0, 0.0, 0.0, 1.0]));
    save_image(&path, &src).unwrap();

    let view = open_image::<Rgba>(&path).unwrap();
    assert_eq!((view.width(), view.height()), (4, 4));

    let patch = view.rasterize(PixelBox::new(3, 0, 2, 1)).unwrap();
    assert!((patch.get(0, 0).0[0] - 1.0).abs() < 1e-6);
    assert_eq!(patch.get(1, 0), Rgba::default());

    std::fs::remove_file(&path).unwrap();
    assert!(view.rasterize_all().is_err());
}

#[test]
fn open_image_missing_file_is_error() {
    let dir = temp_dir("missing");
    assert!(open_image::<Rgba>(dir.join("nope.png")).is_err());
}
