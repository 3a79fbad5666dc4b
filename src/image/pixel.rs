use std::fmt::Debug;

/// Capability set every pixel type used by the engine provides.
///
/// Channels are `f32`. When [`Pixel::HAS_ALPHA`] is set the alpha channel is the last one and
/// color channels are premultiplied by it.
pub trait Pixel: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Number of channels, including alpha.
    const CHANNELS: usize;
    /// Whether the last channel is alpha.
    const HAS_ALPHA: bool;

    /// All channels in storage order.
    fn channels(&self) -> &[f32];

    /// Mutable access to all channels.
    fn channels_mut(&mut self) -> &mut [f32];

    /// Build from a premultiplied RGBA quadruple.
    fn from_rgba(rgba: [f32; 4]) -> Self;

    /// Convert to a premultiplied RGBA quadruple.
    fn to_rgba(&self) -> [f32; 4];

    /// Alpha value; pixel types without alpha are fully opaque.
    fn alpha(&self) -> f32 {
        if Self::HAS_ALPHA {
            self.channels()[Self::CHANNELS - 1]
        } else {
            1.0
        }
    }

    /// Channel-wise sum.
    fn add(mut self, other: Self) -> Self {
        for (a, b) in self.channels_mut().iter_mut().zip(other.channels()) {
            *a += *b;
        }
        self
    }

    /// Channel-wise difference.
    fn sub(mut self, other: Self) -> Self {
        for (a, b) in self.channels_mut().iter_mut().zip(other.channels()) {
            *a -= *b;
        }
        self
    }

    /// Multiply every channel by `s`.
    fn scale(mut self, s: f32) -> Self {
        for c in self.channels_mut() {
            *c *= s;
        }
        self
    }

    /// Return `true` when every channel is finite.
    fn is_finite(&self) -> bool {
        self.channels().iter().all(|&c| c.is_finite())
    }
}

impl Pixel for f32 {
    const CHANNELS: usize = 1;
    const HAS_ALPHA: bool = false;

    fn channels(&self) -> &[f32] {
        std::slice::from_ref(self)
    }

    fn channels_mut(&mut self) -> &mut [f32] {
        std::slice::from_mut(self)
    }

    fn from_rgba(rgba: [f32; 4]) -> Self {
        luma(rgba)
    }

    fn to_rgba(&self) -> [f32; 4] {
        [*self, *self, *self, 1.0]
    }
}

macro_rules! array_pixel {
    ($(#[$doc:meta])* $name:ident, $n:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default, PartialEq)]
        pub struct $name(pub [f32; $n]);

        impl $name {
            /// Build from raw channels.
            pub const fn new(channels: [f32; $n]) -> Self {
                Self(channels)
            }
        }
    };
}

array_pixel!(
    /// Single-channel intensity without alpha.
    Gray, 1
);
array_pixel!(
    /// Intensity plus premultiplied alpha.
    GrayAlpha, 2
);
array_pixel!(
    /// Three color channels without alpha.
    Rgb, 3
);
array_pixel!(
    /// Three premultiplied color channels plus alpha.
    Rgba, 4
);

impl Pixel for Gray {
    const CHANNELS: usize = 1;
    const HAS_ALPHA: bool = false;

    fn channels(&self) -> &[f32] {
        &self.0
    }

    fn channels_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }

    fn from_rgba(rgba: [f32; 4]) -> Self {
        Self([luma(rgba)])
    }

    fn to_rgba(&self) -> [f32; 4] {
        [self.0[0], self.0[0], self.0[0], 1.0]
    }
}

impl Pixel for GrayAlpha {
    const CHANNELS: usize = 2;
    const HAS_ALPHA: bool = true;

    fn channels(&self) -> &[f32] {
        &self.0
    }

    fn channels_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }

    fn from_rgba(rgba: [f32; 4]) -> Self {
        Self([luma(rgba), rgba[3]])
    }

    fn to_rgba(&self) -> [f32; 4] {
        [self.0[0], self.0[0], self.0[0], self.0[1]]
    }
}

impl Pixel for Rgb {
    const CHANNELS: usize = 3;
    const HAS_ALPHA: bool = false;

    fn channels(&self) -> &[f32] {
        &self.0
    }

    fn channels_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }

    fn from_rgba(rgba: [f32; 4]) -> Self {
        Self([rgba[0], rgba[1], rgba[2]])
    }

    fn to_rgba(&self) -> [f32; 4] {
        [self.0[0], self.0[1], self.0[2], 1.0]
    }
}

impl Pixel for Rgba {
    const CHANNELS: usize = 4;
    const HAS_ALPHA: bool = true;

    fn channels(&self) -> &[f32] {
        &self.0
    }

    fn channels_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }

    fn from_rgba(rgba: [f32; 4]) -> Self {
        Self(rgba)
    }

    fn to_rgba(&self) -> [f32; 4] {
        self.0
    }
}

/// Rec. 601 luma of the (premultiplied) color channels.
fn luma(rgba: [f32; 4]) -> f32 {
    0.299 * rgba[0] + 0.587 * rgba[1] + 0.114 * rgba[2]
}

/// Divide every channel by alpha so color is no longer premultiplied and alpha becomes 1.
///
/// Pixels with zero alpha become all-zero. Pixel types without alpha are returned unchanged.
pub fn unpremultiply<P: Pixel>(px: P) -> P {
    if !P::HAS_ALPHA {
        return px;
    }
    let a = px.alpha();
    if a > 0.0 && a.is_finite() {
        px.scale(1.0 / a)
    } else {
        P::default()
    }
}

/// `dst * (1 - alpha(src)) + src` for alpha pixels; plain overwrite otherwise.
pub fn over<P: Pixel>(dst: P, src: P) -> P {
    if P::HAS_ALPHA {
        dst.scale(1.0 - src.alpha()).add(src)
    } else {
        src
    }
}

#[cfg(test)]
#[path = "../../tests/unit/image/pixel.rs"]
mod tests;
