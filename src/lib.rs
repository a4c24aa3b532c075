#![cfg_attr(not(test), no_std)]

pub mod animator;
pub mod ble;
pub mod channel;
pub mod collection;
pub mod color;
pub mod config;
pub mod controller;
pub mod curve;
pub mod dimmer;
pub mod error;
pub mod input;
pub mod output;
pub mod sleep;

pub use animator::{AnimationFrame, LevelAnimator};
pub use ble::{BleClient, BleHost, BleRadio, ConnectionState, RadioChannel, RadioEvent};
pub use collection::{DimmerCollection, DimmerFactory, dimmer_ident};
pub use color::{Colorspace, Rgbwf};
pub use config::ConfigStore;
pub use controller::{Controller, TickResult};
pub use curve::{CalibrationMode, ColorCurveEngine, CurveParams};
pub use dimmer::{
    BleDimmer, Dimmer, DimmerContext, DimmerEvent, DimmerEvents, DimmerRequest, DimmerState,
    LedstripDimmer, PwmDimmer,
};
pub use error::{BleError, Error, GattError, StripError};
pub use input::{InputChannel, InputEvent, InputProcessor, InputReceiver, InputSender};
pub use output::{RgbStrip, RgbwStrip};
pub use sleep::{NeverSleep, SleepControl};

pub use embassy_time::{Duration, Instant};

/// Abstract LED strip driver
///
/// Implement this trait to support different hardware platforms.
/// Strip dimmers are generic over this trait; [`output`] adapts
/// `smart-leds` drivers.
pub trait StripOutput {
    /// Write pixel bytes, `bpp` per pixel in R, G, B(, W) order
    fn refresh(&mut self, pixels: &[u8], bpp: usize) -> Result<(), StripError>;

    /// Switch the strip supply; strips without one ignore this
    fn set_power(&mut self, _on: bool) {}
}
