//! Distribution of a scalar brightness over the pixels of a strip.
//!
//! Light is concentrated around a focal point with a Gaussian profile. When
//! the requested level cannot be reached without pushing the brightest pixel
//! past the color-correct level, the profile is widened until it can.

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::color::{Colorspace, Rgbwf};

/// Spread increment of the widening loop
pub const SPREAD_STEP: f32 = 0.05;

/// Focal spreads above this light the strip uniformly
pub const UNIFORM_SPREAD: f32 = 0.9;

/// Spreads from this value up use a flat profile
pub const FLAT_SPREAD: f32 = 0.99;

/// Lower bound of the profile integral, keeps the correction finite
pub const MIN_CUMULATIVE: f32 = 1e-4;

const MIN_SIGMA: f32 = 1e-3;
const SQRT_PI: f32 = 1.772_453_9;

/// Gaussian profile width for a spread in `[0, 1)`, `None` for a flat
/// profile
pub fn sigma_for_spread(spread: f32) -> Option<f32> {
    if spread >= FLAT_SPREAD {
        return None;
    }
    let spread = spread.max(0.0);
    let sigma = libm::sqrtf(1.0 / (1.0 - spread * spread) - 1.0);
    Some(sigma.max(MIN_SIGMA))
}

/// Brightness profile `f(x) = exp(-((x - focal_point) / sigma)^2)` over
/// normalized strip positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalProfile {
    focal_point: f32,
    sigma: Option<f32>,
}

impl FocalProfile {
    pub fn new(focal_point: f32, spread: f32) -> Self {
        Self {
            focal_point: focal_point.clamp(0.0, 1.0),
            sigma: sigma_for_spread(spread),
        }
    }

    pub const fn is_flat(&self) -> bool {
        self.sigma.is_none()
    }

    /// Profile value at position `x`
    pub fn value(&self, x: f32) -> f32 {
        match self.sigma {
            None => 1.0,
            Some(sigma) => {
                let d = (x - self.focal_point) / sigma;
                libm::expf(-d * d)
            }
        }
    }

    /// Integral of the profile over `[from, to]`
    pub fn integral(&self, from: f32, to: f32) -> f32 {
        match self.sigma {
            None => to - from,
            Some(sigma) => {
                let left = libm::erff((from - self.focal_point) / sigma);
                let right = libm::erff((to - self.focal_point) / sigma);
                sigma * SQRT_PI / 2.0 * (right - left)
            }
        }
    }

    /// Light delivered over the whole strip, relative to a flat profile
    pub fn cumulative(&self) -> f32 {
        self.integral(0.0, 1.0)
    }
}

/// How [`distribute`] lit the strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Every pixel at the requested level
    Uniform,
    /// Focal profile after widening
    Focused {
        /// Spread actually used
        spread: f32,
        /// Profile integral at that spread
        cumulative: f32,
        /// `level / (cumulative * max_correct)`
        correction: f32,
    },
}

/// Choose how to light the strip for `level`.
pub fn plan(level: f32, max_correct: f32, focal_point: f32, focal_spread: f32) -> (Distribution, FocalProfile) {
    let flat = FocalProfile::new(focal_point, 1.0);
    if level <= 0.0 || level >= max_correct || focal_spread > UNIFORM_SPREAD {
        return (Distribution::Uniform, flat);
    }

    let mut spread = focal_spread.clamp(0.0, 1.0);
    let (profile, cumulative) = loop {
        let profile = FocalProfile::new(focal_point, spread);
        let cumulative = profile.cumulative().max(MIN_CUMULATIVE);
        if cumulative * max_correct >= level || spread >= 1.0 {
            break (profile, cumulative);
        }
        spread = (spread + SPREAD_STEP).min(1.0);
    };

    let correction = level / (cumulative * max_correct);
    (
        Distribution::Focused {
            spread,
            cumulative,
            correction,
        },
        profile,
    )
}

/// Fill `out` with the brightness of each pixel.
///
/// Each pixel gets the profile averaged over its own span of the strip, so
/// the mean of `out` equals `level` and no pixel exceeds `max_correct`.
#[allow(clippy::cast_precision_loss)]
pub fn distribute(
    level: f32,
    max_correct: f32,
    focal_point: f32,
    focal_spread: f32,
    out: &mut [f32],
) -> Distribution {
    let (distribution, profile) = plan(level, max_correct, focal_point, focal_spread);
    let count = out.len();
    match distribution {
        Distribution::Uniform => out.fill(level.clamp(0.0, 1.0)),
        Distribution::Focused { correction, .. } => {
            let n = count as f32;
            for (i, pixel) in out.iter_mut().enumerate() {
                let from = i as f32 / n;
                let to = (i + 1) as f32 / n;
                let average = profile.integral(from, to) * n;
                *pixel = (average * correction * max_correct).clamp(0.0, 1.0);
            }
        }
    }
    distribution
}

/// Strip calibration modes, used to tune the white LED parameters by eye
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// Color-accurate RGBW rendering
    #[default]
    Normal,
    /// RGB LEDs only
    Rgb,
    /// Even pixels RGBW, odd pixels RGB only
    Alternating,
    /// Raw drive values from the calibration data
    Hard,
}

impl CalibrationMode {
    pub const fn as_i32(self) -> i32 {
        match self {
            CalibrationMode::Normal => 0,
            CalibrationMode::Rgb => 1,
            CalibrationMode::Alternating => 2,
            CalibrationMode::Hard => 3,
        }
    }

    /// Unknown values fall back to [`CalibrationMode::Normal`]
    pub const fn from_i32(value: i32) -> Self {
        match value {
            1 => CalibrationMode::Rgb,
            2 => CalibrationMode::Alternating,
            3 => CalibrationMode::Hard,
            _ => CalibrationMode::Normal,
        }
    }
}

/// Parameters of [`ColorCurveEngine::render`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    pub focal_point: f32,
    pub focal_spread: f32,
    pub calibration: CalibrationMode,
    /// Raw drive for even and odd pixels in [`CalibrationMode::Hard`]
    pub calibration_data: [f32; 8],
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            focal_point: crate::config::DEFAULT_FOCAL_POINT,
            focal_spread: crate::config::DEFAULT_FOCAL_SPREAD,
            calibration: CalibrationMode::Normal,
            calibration_data: [0.0; 8],
        }
    }
}

impl CurveParams {
    /// Store calibration values; 4 values are used for both pixel parities
    pub fn set_calibration_data(&mut self, values: &[f32]) {
        match values.len() {
            4 => {
                self.calibration_data[..4].copy_from_slice(values);
                self.calibration_data[4..].copy_from_slice(values);
            }
            8 => self.calibration_data.copy_from_slice(values),
            _n => {
                #[cfg(feature = "esp32-log")]
                println!("[curve] ignoring {} calibration values", _n);
            }
        }
    }
}

/// Turns a level and color temperature into per-pixel drive bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCurveEngine {
    colorspace: Colorspace,
    temperature: f32,
    max_correct_level: f32,
    params: CurveParams,
}

impl ColorCurveEngine {
    /// Create a new engine for the given white LED and color temperature
    pub fn new(colorspace: Colorspace, temperature: f32) -> Self {
        Self {
            colorspace,
            temperature,
            max_correct_level: colorspace.max_correct_level(temperature),
            params: CurveParams::default(),
        }
    }

    pub const fn colorspace(&self) -> &Colorspace {
        &self.colorspace
    }

    pub fn set_colorspace(&mut self, colorspace: Colorspace) {
        self.colorspace = colorspace;
        self.max_correct_level = colorspace.max_correct_level(self.temperature);
    }

    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
        self.max_correct_level = self.colorspace.max_correct_level(temperature);
    }

    /// Highest level at which every pixel can be color-accurate
    pub const fn max_correct_level(&self) -> f32 {
        self.max_correct_level
    }

    pub const fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut CurveParams {
        &mut self.params
    }

    /// Drive for pixel `index` at brightness `level`
    pub fn pixel(&self, index: usize, level: f32) -> Rgbwf {
        let rgbw = || self.colorspace.to_rgbw(self.temperature, level);
        let rgb = || self.colorspace.to_rgb_only(self.temperature, level);
        match self.params.calibration {
            CalibrationMode::Normal => rgbw(),
            CalibrationMode::Rgb => rgb(),
            CalibrationMode::Alternating if index % 2 == 1 => rgb(),
            CalibrationMode::Alternating => rgbw(),
            CalibrationMode::Hard => {
                let offset = (index % 2) * 4;
                let mut raw = [0.0; 4];
                raw.copy_from_slice(&self.params.calibration_data[offset..offset + 4]);
                Rgbwf::from_slice(&raw)
            }
        }
    }

    /// Render `level` into `pixels`, `bpp` bytes per pixel (GRB order is
    /// left to the driver).
    ///
    /// `levels` is scratch space with one slot per pixel. Returns true if
    /// any byte changed; a `bpp` other than 3 or 4 renders nothing.
    pub fn render(&self, level: f32, gamma: f32, bpp: usize, levels: &mut [f32], pixels: &mut [u8]) -> bool {
        if bpp != 3 && bpp != 4 {
            return false;
        }
        let count = levels.len().min(pixels.len() / bpp);
        let levels = &mut levels[..count];
        distribute(
            level,
            self.max_correct_level,
            self.params.focal_point,
            self.params.focal_spread,
            levels,
        );

        let mut changed = false;
        for (i, (chunk, level)) in pixels.chunks_exact_mut(bpp).zip(levels.iter()).enumerate() {
            let bytes = self.pixel(i, *level).to_bytes(gamma);
            for (dst, src) in chunk.iter_mut().zip(bytes.iter()) {
                if *dst != *src {
                    *dst = *src;
                    changed = true;
                }
            }
        }
        changed
    }
}
