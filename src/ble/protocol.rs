//! GATT layout and wire encoding of the remote dimmer service.
//!
//! Shared by the central role (this crate's BLE dimmer) and the peripheral
//! role running on the remote device.

use super::Uuid;

/// Remote dimmer service
pub const SERVICE: Uuid = Uuid::from_u128(0x6B2F_0001_38BC_4204_A506_1D35_46AD_3688);
/// On/off, 1 byte
pub const IS_ON: Uuid = Uuid::from_u128(0x6B2F_0002_38BC_4204_A506_1D35_46AD_3688);
/// Identify trigger, write-only 1 byte
pub const IDENTIFY: Uuid = Uuid::from_u128(0x6B2F_0003_38BC_4204_A506_1D35_46AD_3688);
/// Brightness, 2 bytes little endian scaled to 0..=65535
pub const BRIGHTNESS: Uuid = Uuid::from_u128(0x6B2F_0004_38BC_4204_A506_1D35_46AD_3688);
/// Color temperature, 2 bytes little endian Kelvin
pub const TEMPERATURE: Uuid = Uuid::from_u128(0x6B2F_0005_38BC_4204_A506_1D35_46AD_3688);

/// Encode a level in `[0, 1]` for the brightness characteristic
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_brightness(level: f32) -> u16 {
    (level.clamp(0.0, 1.0) * f32::from(u16::MAX)) as u16
}

/// Decode the brightness characteristic
pub fn decode_brightness(value: u16) -> f32 {
    f32::from(value) / f32::from(u16::MAX)
}

/// Encode a color temperature
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_temperature(kelvin: f32) -> u16 {
    kelvin.clamp(0.0, f32::from(u16::MAX)) as u16
}
