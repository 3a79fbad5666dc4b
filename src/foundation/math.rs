/// Taps of the pyramid reduction blur.
pub(crate) const REDUCE_KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

/// `floor(v / 2)` for any sign.
pub(crate) fn floor_div2(v: i32) -> i32 {
    v.div_euclid(2)
}

/// Straight 8-bit channel to linear `[0, 1]`.
pub(crate) fn unorm8_to_f32(v: u8) -> f32 {
    f32::from(v) / 255.0
}

/// Linear `[0, 1]` to straight 8-bit, clamping and rounding.
pub(crate) fn f32_to_unorm8(v: f32) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Divide by `den`, mapping a zero (or non-finite) denominator to `None`.
pub(crate) fn checked_ratio(num: f32, den: f32) -> Option<f32> {
    if den > 0.0 && den.is_finite() {
        let r = num / den;
        r.is_finite().then_some(r)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
