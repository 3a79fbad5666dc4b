use crate::foundation::core::PixelBox;
use crate::foundation::math::{REDUCE_KERNEL, floor_div2};
use crate::image::buffer::ImageBuf;
use crate::image::pixel::Pixel;

/// Blur `src` (covering `src_box`) with the 3-tap reduction kernel and sample every other pixel.
///
/// Samples outside `src_box` are zero. The result covers `src_box.reduced()`, which is exactly
/// the set of coarse pixels the blurred image touches; coarse pixel `X` is centered on fine pixel
/// `2X`. Returns the reduced buffer together with its box.
pub fn reduce2<P: Pixel>(src: &ImageBuf<P>, src_box: PixelBox) -> (ImageBuf<P>, PixelBox) {
    let dst_box = src_box.reduced();
    let (dw, dh) = dst_box.size();
    let (_, sh) = src_box.size();

    // Horizontal pass: coarse columns, fine rows.
    let mut tmp = ImageBuf::<P>::new(dw, sh);
    for y in 0..sh {
        for dx in 0..dw {
            let cx = 2 * (dst_box.x + dx as i32) - src_box.x;
            let mut acc = P::default();
            for (k, w) in REDUCE_KERNEL.iter().enumerate() {
                let px = src.get_or_zero(cx + k as i32 - 1, y as i32);
                acc = acc.add(px.scale(*w));
            }
            tmp.set(dx, y, acc);
        }
    }

    let mut out = ImageBuf::<P>::new(dw, dh);
    for dy in 0..dh {
        let cy = 2 * (dst_box.y + dy as i32) - src_box.y;
        for dx in 0..dw {
            let mut acc = P::default();
            for (k, w) in REDUCE_KERNEL.iter().enumerate() {
                let px = tmp.get_or_zero(dx as i32, cy + k as i32 - 1);
                acc = acc.add(px.scale(*w));
            }
            out.set(dx, dy, acc);
        }
    }
    (out, dst_box)
}

/// Upsample `coarse` (covering `coarse_box`) by two with bilinear interpolation over `dst_box`.
///
/// Fine pixel `x` maps to coarse `x / 2`: even pixels copy the coarse sample, odd pixels average
/// their two coarse neighbours. Coarse samples outside `coarse_box` are zero.
pub fn expand2<P: Pixel>(
    coarse: &ImageBuf<P>,
    coarse_box: PixelBox,
    dst_box: PixelBox,
) -> ImageBuf<P> {
    let (dw, dh) = dst_box.size();
    if dw == 0 || dh == 0 {
        return ImageBuf::new(dw, dh);
    }

    let cy0 = floor_div2(dst_box.y);
    let cy1 = floor_div2(dst_box.max_y()) + 1;
    let rows = (cy1 - cy0) as usize;

    let sample = |cx: i32, cy: i32| coarse.get_or_zero(cx - coarse_box.x, cy - coarse_box.y);

    // Horizontal pass over the coarse rows the vertical pass needs.
    let mut tmp = ImageBuf::<P>::new(dw, rows);
    for r in 0..rows {
        let cy = cy0 + r as i32;
        for dx in 0..dw {
            let x = dst_box.x + dx as i32;
            let cx = floor_div2(x);
            let v = if x.rem_euclid(2) == 0 {
                sample(cx, cy)
            } else {
                sample(cx, cy).add(sample(cx + 1, cy)).scale(0.5)
            };
            tmp.set(dx, r, v);
        }
    }

    let mut out = ImageBuf::<P>::new(dw, dh);
    for dy in 0..dh {
        let y = dst_box.y + dy as i32;
        let r = (floor_div2(y) - cy0) as usize;
        for dx in 0..dw {
            let v = if y.rem_euclid(2) == 0 {
                tmp.get(dx, r)
            } else {
                tmp.get(dx, r).add(tmp.get(dx, r + 1)).scale(0.5)
            };
            out.set(dx, dy, v);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/image/resample.rs"]
mod tests;
