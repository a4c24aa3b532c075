//! RGBW gamut mapping for strips with a dedicated white LED.
//!
//! The white LED emits `white_brightness * kelvin_to_rgb(white_temperature)`
//! in units of the RGB LEDs. A target color is rendered by taking as much
//! light as possible from the white LED without any RGB channel going
//! negative, which keeps the perceived color exact.

use super::{Rgbf, Rgbwf, kelvin_to_rgb};

/// Rec. 709 relative luminance
#[inline]
pub fn luminance(color: &Rgbf) -> f32 {
    0.2126 * color.r + 0.7152 * color.g + 0.0722 * color.b
}

const EPSILON: f32 = 1e-6;

/// Color-accurate RGBW converter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colorspace {
    white_temperature: f32,
    white_brightness: f32,
    /// Light emitted by the white LED at full drive
    white: Rgbf,
}

impl Colorspace {
    /// Create a new colorspace for a white LED of the given temperature
    /// and relative brightness
    pub fn new(white_temperature: f32, white_brightness: f32) -> Self {
        let white_brightness = white_brightness.max(0.0);
        Self {
            white_temperature,
            white_brightness,
            white: kelvin_to_rgb(white_temperature).scale(white_brightness),
        }
    }

    pub const fn white_temperature(&self) -> f32 {
        self.white_temperature
    }

    pub const fn white_brightness(&self) -> f32 {
        self.white_brightness
    }

    /// Brightness of the strip with every channel fully on
    fn full_output(&self) -> f32 {
        1.0 + luminance(&self.white)
    }

    /// True brightness of an RGBW drive tuple, 1.0 is every channel on
    pub fn brightness(&self, color: &Rgbwf) -> f32 {
        let rgb = luminance(&Rgbf::new(color.r, color.g, color.b));
        (rgb + color.w * luminance(&self.white)) / self.full_output()
    }

    /// White drive per unit of `color` that keeps every RGB channel
    /// non-negative
    fn white_ratio(&self, color: &Rgbf) -> f32 {
        let pairs = [
            (color.r, self.white.r),
            (color.g, self.white.g),
            (color.b, self.white.b),
        ];
        pairs
            .iter()
            .filter(|(_, w)| *w > EPSILON)
            .map(|(c, w)| c / w)
            .fold(f32::INFINITY, f32::min)
    }

    /// Color-accurate drive for `color` scaled by `scale`
    fn drive(&self, color: &Rgbf, scale: f32) -> Rgbwf {
        let ratio = self.white_ratio(color);
        let w = if ratio.is_finite() {
            (scale * ratio).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Rgbwf::new(
            (scale * color.r - w * self.white.r).clamp(0.0, 1.0),
            (scale * color.g - w * self.white.g).clamp(0.0, 1.0),
            (scale * color.b - w * self.white.b).clamp(0.0, 1.0),
            w,
        )
    }

    /// Largest `scale` for which [`Colorspace::drive`] stays in gamut
    fn max_scale(&self, color: &Rgbf) -> f32 {
        let ratio = self.white_ratio(color);
        if !ratio.is_finite() || ratio <= EPSILON {
            let max = color.max_channel();
            return if max > EPSILON { 1.0 / max } else { 0.0 };
        }

        // While the white LED is below full drive, every residual grows
        // linearly with scale.
        let residual = [
            color.r - ratio * self.white.r,
            color.g - ratio * self.white.g,
            color.b - ratio * self.white.b,
        ]
        .iter()
        .fold(0.0_f32, |acc, v| acc.max(*v));
        let white_full = 1.0 / ratio;
        if residual > EPSILON && 1.0 / residual <= white_full {
            return 1.0 / residual;
        }

        // Otherwise white saturates first and the RGB LEDs carry the rest.
        [
            (color.r, self.white.r),
            (color.g, self.white.g),
            (color.b, self.white.b),
        ]
        .iter()
        .filter(|(c, _)| *c > EPSILON)
        .map(|(c, w)| (1.0 + w) / c)
        .fold(f32::INFINITY, f32::min)
    }

    /// Brightest color-accurate rendering of `temperature`
    pub fn max_correct(&self, temperature: f32) -> Rgbwf {
        let color = kelvin_to_rgb(temperature);
        self.drive(&color, self.max_scale(&color))
    }

    /// Highest brightness renderable at `temperature` without color error
    pub fn max_correct_level(&self, temperature: f32) -> f32 {
        self.brightness(&self.max_correct(temperature))
    }

    /// Render `temperature` at true brightness `level`.
    ///
    /// Up to the color-correct level the result is exact. Above it the
    /// drive blends towards every channel fully on, reaching it at 1.0.
    pub fn to_rgbw(&self, temperature: f32, level: f32) -> Rgbwf {
        let level = level.clamp(0.0, 1.0);
        if level <= 0.0 {
            return Rgbwf::OFF;
        }
        let color = kelvin_to_rgb(temperature);
        let max = self.drive(&color, self.max_scale(&color));
        let max_level = self.brightness(&max);

        if level <= max_level {
            let unit = luminance(&color) / self.full_output();
            if unit <= EPSILON {
                return Rgbwf::OFF;
            }
            return self.drive(&color, level / unit);
        }

        let headroom = 1.0 - max_level;
        if headroom <= EPSILON {
            return max;
        }
        max.lerp(&Rgbwf::FULL, (level - max_level) / headroom)
    }

    /// Render `temperature` at `level` using the RGB LEDs only.
    ///
    /// Brightness uses the same scale as [`Colorspace::to_rgbw`], so the two
    /// can be compared side by side.
    pub fn to_rgb_only(&self, temperature: f32, level: f32) -> Rgbwf {
        let level = level.clamp(0.0, 1.0);
        let color = kelvin_to_rgb(temperature);
        let unit = luminance(&color) / self.full_output();
        if level <= 0.0 || unit <= EPSILON {
            return Rgbwf::OFF;
        }
        let c = color.scale(level / unit);
        Rgbwf::new(
            c.r.clamp(0.0, 1.0),
            c.g.clamp(0.0, 1.0),
            c.b.clamp(0.0, 1.0),
            0.0,
        )
    }
}

impl Default for Colorspace {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_WHITE_TEMPERATURE,
            crate::config::DEFAULT_WHITE_BRIGHTNESS,
        )
    }
}
