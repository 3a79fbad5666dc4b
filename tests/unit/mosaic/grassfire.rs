use super::*;

fn brute_force(alpha: &ImageBuf<f32>) -> ImageBuf<f32> {
    let (w, h) = (alpha.width() as i32, alpha.height() as i32);
    ImageBuf::from_fn(alpha.width(), alpha.height(), |x, y| {
        if alpha.get(x, y) <= 0.0 {
            return 0.0;
        }
        let (x, y) = (x as i32, y as i32);
        // Distance to the outside frame.
        let mut best = (x + 1).min(y + 1).min(w - x).min(h - y);
        for j in 0..h {
            for i in 0..w {
                if alpha.get(i as usize, j as usize) <= 0.0 {
                    best = best.min((i - x).abs() + (j - y).abs());
                }
            }
        }
        best as f32
    })
}

#[test]
fn opaque_square_peaks_in_the_middle() {
    let alpha = ImageBuf::from_fn(5, 5, |_, _| 1.0f32);
    let d = grassfire(&alpha);
    assert_eq!(d.row(0), &[1.0, 1.0, 1.0, 1.0, 1.0]);
    assert_eq!(d.row(1), &[1.0, 2.0, 2.0, 2.0, 1.0]);
    assert_eq!(d.row(2), &[1.0, 2.0, 3.0, 2.0, 1.0]);
}

#[test]
fn holes_are_zero_and_repel_distance() {
    let alpha = ImageBuf::from_fn(7, 6, |x, y| {
        if (x == 3 && y == 2) || (x == 5 && y == 4) {
            0.0f32
        } else {
            0.8
        }
    });
    let d = grassfire(&alpha);
    assert_eq!(d.get(3, 2), 0.0);
    assert_eq!(d, brute_force(&alpha));
}

#[test]
fn matches_brute_force_on_irregular_alpha() {
    let alpha = ImageBuf::from_fn(9, 7, |x, y| {
        if (x * 7 + y * 3) % 11 == 0 { 0.0f32 } else { 0.5 }
    });
    assert_eq!(grassfire(&alpha), brute_force(&alpha));
}

#[test]
fn empty_image() {
    let d = grassfire(&ImageBuf::<f32>::new(0, 0));
    assert_eq!(d.pixels().len(), 0);
}
