//! Compile-time tuning constants and the persistent configuration seam.
//!
//! Timing parameters, defaults and capacities live here so they can be tuned
//! in one place. Persistent storage itself is provided by the application
//! through [`ConfigStore`].

use core::fmt::Write;

use embassy_time::Duration;
use heapless::String;

#[cfg(feature = "esp32-log")]
use esp_println::println;

// Capacities

/// Maximum length of a dimmer or BLE device name.
pub const NAME_LEN: usize = 32;

/// Maximum length of a namespaced config key.
pub const KEY_LEN: usize = 48;

/// Maximum number of BLE devices the registry tracks.
pub const MAX_BLE_DEVICES: usize = 8;

/// Maximum number of unassigned device names remembered during discovery.
pub const MAX_UNKNOWN_DEVICES: usize = 8;

/// Maximum number of dimmers in a collection.
pub const MAX_DIMMERS: usize = 8;

/// Pixel buffer capacity in bytes (`count * bpp`).
pub const MAX_PIXEL_BYTES: usize = 4 * 150;

/// Maximum number of pixels on a strip.
pub const MAX_PIXELS: usize = 150;

/// Maximum GATT value length handled by reads and notifications.
pub const MAX_VALUE_LEN: usize = 20;

// BLE client

/// How long a pending transmit keeps trying to reach its device.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default time an idle connection is kept open after a transmit.
pub const DEFAULT_KEEP_OPEN: Duration = Duration::from_millis(1_000);

/// Upper bound the client imposes on any keep-open window.
pub const MAX_KEEP_OPEN: Duration = Duration::from_millis(5_000);

/// Extra sleep postponement on top of the keep-open window.
pub const KEEP_OPEN_SLEEP_MARGIN: Duration = Duration::from_millis(1_000);

/// Minimum interval between "BLE busy" warnings.
pub const BUSY_WARNING_INTERVAL: Duration = Duration::from_millis(4_000);

/// Length of one scan session.
pub const SCAN_DURATION: Duration = Duration::from_secs(11);

/// Grace window after a scan before scanning is reconsidered.
///
/// Not a multiple of common advertising intervals.
pub const PAUSE_BETWEEN_SCANS: Duration = Duration::from_millis(1_953);

/// How long `start_scan_unknown` keeps looking for unassigned devices.
pub const SCAN_UNKNOWN_DURATION: Duration = Duration::from_secs(20);

/// Sleep postponement requested by `start_scan_unknown`.
pub const SCAN_UNKNOWN_SLEEP: Duration = Duration::from_secs(21);

/// Sleep postponement after a scan stops.
pub const SCAN_STOP_SLEEP: Duration = Duration::from_millis(100);

// Dimmers

/// Extra sleep postponement on top of an animation.
pub const ANIMATION_SLEEP_MARGIN: Duration = Duration::from_millis(100);

/// Sleep postponement requested every tick while a PWM output is lit.
pub const PWM_LIT_SLEEP: Duration = Duration::from_millis(100);

/// Length of one identify flash step.
pub const IDENTIFY_STEP: Duration = Duration::from_millis(100);

/// PWM duty used for the identify flash.
pub const IDENTIFY_PWM_DUTY: u8 = 128;

/// Level change per up/down input event.
pub const LEVEL_STEP: f32 = 0.02;

/// Temperature change per up/down input event (Kelvin).
pub const TEMPERATURE_STEP: f32 = 100.0;

/// Coolest temperature reachable from input events.
pub const TEMPERATURE_MIN: f32 = 2200.0;

/// Warmest temperature reachable from input events.
pub const TEMPERATURE_MAX: f32 = 6500.0;

// Defaults

pub const DEFAULT_LEVEL: f32 = 0.0;
pub const DEFAULT_MIN_LEVEL: f32 = 0.1;
pub const DEFAULT_GAMMA: f32 = 1.0;
pub const DEFAULT_ANIMATION_MS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 4000.0;
pub const DEFAULT_PWM_FREQUENCY: f32 = 5000.0;
pub const DEFAULT_WHITE_TEMPERATURE: f32 = 4000.0;
pub const DEFAULT_WHITE_BRIGHTNESS: f32 = 1.0;
pub const DEFAULT_FOCAL_POINT: f32 = 0.5;
pub const DEFAULT_FOCAL_SPREAD: f32 = 1.0;

/// Persistent key/value configuration store.
///
/// Implemented by the application on top of its storage backend. Getters
/// return `None` when the key is absent or holds a malformed value.
pub trait ConfigStore {
    fn get_f32(&self, key: &str) -> Option<f32>;
    fn get_i32(&self, key: &str) -> Option<i32>;
    fn get_str(&self, key: &str) -> Option<String<NAME_LEN>>;

    fn put_f32(&mut self, key: &str, value: f32);
    fn put_i32(&mut self, key: &str, value: i32);
    fn put_str(&mut self, key: &str, value: &str);

    fn remove(&mut self, key: &str);
}

/// Build a namespaced key such as `dimmer0.level`; an empty prefix yields
/// the bare field.
///
/// Returns `None` when the key does not fit in [`KEY_LEN`]; callers skip
/// such entries rather than use a truncated key.
pub fn config_key(prefix: &str, field: &str) -> Option<String<KEY_LEN>> {
    let mut key = String::new();
    let written = if prefix.is_empty() {
        key.push_str(field).is_ok()
    } else {
        write!(key, "{prefix}.{field}").is_ok()
    };
    if !written {
        #[cfg(feature = "esp32-log")]
        println!("[config] key too long: {}.{}", prefix, field);
        return None;
    }
    Some(key)
}

/// Namespace of dimmer `num`, optionally below `parent` (`parent.dimmer<num>`).
pub fn dimmer_prefix(parent: &str, num: u8) -> Option<String<KEY_LEN>> {
    let mut key = String::new();
    let written = if parent.is_empty() {
        write!(key, "dimmer{num}")
    } else {
        write!(key, "{parent}.dimmer{num}")
    };
    written.ok().map(|()| key)
}

/// Read an `f32` field, falling back to `default`.
pub fn load_f32<S: ConfigStore + ?Sized>(store: &S, prefix: &str, field: &str, default: f32) -> f32 {
    config_key(prefix, field)
        .and_then(|key| store.get_f32(&key))
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Read an `i32` field, falling back to `default`.
pub fn load_i32<S: ConfigStore + ?Sized>(store: &S, prefix: &str, field: &str, default: i32) -> i32 {
    config_key(prefix, field)
        .and_then(|key| store.get_i32(&key))
        .unwrap_or(default)
}

pub fn load_str<S: ConfigStore + ?Sized>(store: &S, prefix: &str, field: &str) -> Option<String<NAME_LEN>> {
    config_key(prefix, field).and_then(|key| store.get_str(&key))
}

pub fn save_f32<S: ConfigStore + ?Sized>(store: &mut S, prefix: &str, field: &str, value: f32) {
    if let Some(key) = config_key(prefix, field) {
        store.put_f32(&key, value);
    }
}

pub fn save_i32<S: ConfigStore + ?Sized>(store: &mut S, prefix: &str, field: &str, value: i32) {
    if let Some(key) = config_key(prefix, field) {
        store.put_i32(&key, value);
    }
}

pub fn save_str<S: ConfigStore + ?Sized>(store: &mut S, prefix: &str, field: &str, value: &str) {
    if let Some(key) = config_key(prefix, field) {
        store.put_str(&key, value);
    }
}

pub fn remove_field<S: ConfigStore + ?Sized>(store: &mut S, prefix: &str, field: &str) {
    if let Some(key) = config_key(prefix, field) {
        store.remove(&key);
    }
}
