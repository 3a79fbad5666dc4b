use crate::image::buffer::ImageBuf;

/// Manhattan distance from each valid pixel to the nearest invalid one.
///
/// A pixel is valid when its alpha is positive. Everything outside the image counts as invalid,
/// so valid border pixels get 1 and values grow toward the interior; invalid pixels get 0.
pub fn grassfire(alpha: &ImageBuf<f32>) -> ImageBuf<f32> {
    let (w, h) = (alpha.width(), alpha.height());
    let mut dist = ImageBuf::<f32>::new(w, h);

    for y in 0..h {
        for x in 0..w {
            if alpha.get(x, y) <= 0.0 {
                continue;
            }
            let left = if x > 0 { dist.get(x - 1, y) } else { 0.0 };
            let up = if y > 0 { dist.get(x, y - 1) } else { 0.0 };
            dist.set(x, y, left.min(up) + 1.0);
        }
    }

    for y in (0..h).rev() {
        for x in (0..w).rev() {
            let d = dist.get(x, y);
            if d == 0.0 {
                continue;
            }
            let right = if x + 1 < w { dist.get(x + 1, y) } else { 0.0 };
            let down = if y + 1 < h { dist.get(x, y + 1) } else { 0.0 };
            dist.set(x, y, d.min(right + 1.0).min(down + 1.0));
        }
    }
    dist
}

#[cfg(test)]
#[path = "../../tests/unit/mosaic/grassfire.rs"]
mod tests;
