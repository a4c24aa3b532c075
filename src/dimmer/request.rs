use heapless::{String, Vec};

use crate::ble::DeviceName;
use crate::curve::CalibrationMode;

/// Changes requested by the web/API layer.
///
/// Every field is optional; absent fields are left alone. Out of range
/// values are clamped, never rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimmerRequest {
    /// Flash the light so the user can find it
    pub identify: bool,
    pub is_on: Option<bool>,
    pub level: Option<f32>,
    pub temperature: Option<f32>,

    // Configuration
    pub name: Option<DeviceName>,
    pub min_level: Option<f32>,
    pub gamma: Option<f32>,
    pub animation_ms: Option<u32>,
    pub pwm_frequency: Option<f32>,

    // LED strip configuration
    pub white_temperature: Option<f32>,
    pub white_brightness: Option<f32>,
    pub focal_point: Option<f32>,
    pub focal_spread: Option<f32>,
    pub calibration_mode: Option<CalibrationMode>,
    /// Two RGBW tuples, or one repeated
    pub calibration_data: Option<Vec<f32, 8>>,
}

impl DimmerRequest {
    /// Request that only switches the dimmer on or off
    pub fn on(is_on: bool) -> Self {
        Self {
            is_on: Some(is_on),
            ..Self::default()
        }
    }

    /// Request that only sets the level
    pub fn level(level: f32) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }
}

/// LED strip part of a [`DimmerState`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripState {
    pub white_temperature: f32,
    pub white_brightness: f32,
    pub focal_point: f32,
    pub focal_spread: f32,
    pub max_level_correct_color: f32,
    pub calibration_mode: CalibrationMode,
}

/// BLE dimmer part of a [`DimmerState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    pub address: Option<String<17>>,
    /// False while values may be stale
    pub data_valid: bool,
}

/// Reply object for the web/API layer
#[derive(Debug, Clone, PartialEq)]
pub struct DimmerState {
    pub num: u8,
    pub name: DeviceName,
    pub available: bool,
    pub is_on: bool,
    pub level: f32,
    pub min_level: f32,
    pub gamma: f32,
    pub animation_ms: u32,
    pub temperature: Option<f32>,
    pub pwm_frequency: Option<f32>,
    pub strip: Option<StripState>,
    pub remote: Option<RemoteState>,
}
