//! Floating point color types and conversions for RGBW strips.

mod colorspace;
mod kelvin;

pub use colorspace::{Colorspace, luminance};
pub use kelvin::kelvin_to_rgb;

/// Linear RGB color, channels in `[0, 1]`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rgbf {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgbf {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Largest channel value
    pub fn max_channel(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    /// Scale so the largest channel is 1.0
    pub fn normalized(&self) -> Self {
        let max = self.max_channel();
        if max <= 0.0 {
            return Self::new(1.0, 1.0, 1.0);
        }
        self.scale(1.0 / max)
    }

    pub fn scale(&self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

/// Linear RGBW drive levels, channels in `[0, 1]`
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rgbwf {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub w: f32,
}

impl Rgbwf {
    pub const OFF: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const FULL: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, w: f32) -> Self {
        Self { r, g, b, w }
    }

    /// Build from 4 consecutive floats
    pub const fn from_slice(values: &[f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Linear blend, `amount` 0 is `self`, 1 is `other`
    pub fn lerp(&self, other: &Self, amount: f32) -> Self {
        let t = amount.clamp(0.0, 1.0);
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.w + (other.w - self.w) * t,
        )
    }

    /// Drop the white channel
    pub const fn without_white(&self) -> Self {
        Self::new(self.r, self.g, self.b, 0.0)
    }

    /// Convert to 8-bit channels, applying `gamma` to each channel
    pub fn to_bytes(&self, gamma: f32) -> [u8; 4] {
        [
            channel_to_u8(self.r, gamma),
            channel_to_u8(self.g, gamma),
            channel_to_u8(self.b, gamma),
            channel_to_u8(self.w, gamma),
        ]
    }
}

/// Convert a linear channel value to 8 bits
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn channel_to_u8(value: f32, gamma: f32) -> u8 {
    let value = value.clamp(0.0, 1.0);
    let value = if gamma > 0.0 && libm::fabsf(gamma - 1.0) > f32::EPSILON {
        libm::powf(value, gamma)
    } else {
        value
    };
    (value * 255.0 + 0.5) as u8
}
