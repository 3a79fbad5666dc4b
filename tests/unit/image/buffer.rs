use super::*;
use crate::image::pixel::Rgba;

fn ramp(w: usize, h: usize) -> ImageBuf<f32> {
    ImageBuf::from_fn(w, h, |x, y| (y * w + x) as f32)
}

#[test]
fn from_vec_validates_length() {
    assert!(ImageBuf::<f32>::from_vec(2, 2, vec![0.0; 3]).is_err());
    let img = ImageBuf::<f32>::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(img.get(1, 1), 4.0);
}

#[test]
fn region_zero_fills_outside() {
    let img = ramp(3, 2);
    let r = img.region(PixelBox::new(-1, 1, 3, 2));
    assert_eq!(r.width(), 3);
    assert_eq!(r.height(), 2);
    assert_eq!(r.row(0), &[0.0, 3.0, 4.0]);
    assert_eq!(r.row(1), &[0.0, 0.0, 0.0]);
}

#[test]
fn region_fully_outside_is_zero() {
    let img = ramp(3, 3);
    let r = img.region(PixelBox::new(10, 10, 2, 2));
    assert!(r.pixels().iter().all(|&p| p == 0.0));
}

#[test]
fn paste_clips_to_bounds() {
    let mut dst = ImageBuf::<f32>::new(3, 3);
    let src = ImageBuf::from_fn(2, 2, |_, _| 1.0f32);
    dst.paste(&src, 2, -1);
    assert_eq!(dst.row(0), &[0.0, 0.0, 1.0]);
    assert_eq!(dst.row(1), &[0.0, 0.0, 0.0]);
}

#[test]
fn get_or_zero_outside() {
    let img = ramp(2, 2);
    assert_eq!(img.get_or_zero(-1, 0), 0.0);
    assert_eq!(img.get_or_zero(1, 1), 3.0);
    assert_eq!(img.get_or_zero(2, 0), 0.0);
}

#[test]
fn alpha_plane_extracts_last_channel() {
    let img = ImageBuf::from_fn(2, 1, |x, _| Rgba::new([0.1, 0.1, 0.1, x as f32 * 0.5]));
    assert_eq!(img.alpha_plane().pixels(), &[0.0, 0.5]);
    assert_eq!(img.size_bytes(), 2 * 16);
}
