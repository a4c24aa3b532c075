//! [`StripOutput`] adapters for `smart-leds` drivers.
//!
//! Pixel bytes come in R, G, B(, W) order; the driver takes care of the
//! wire order of its chip. An optional GPIO switches the strip's supply so
//! a dark strip draws no quiescent current.

use embedded_hal::digital::{ErrorType, OutputPin};
use smart_leds::{RGB8, RGBW, SmartLedsWrite, White};

use crate::StripOutput;
use crate::error::StripError;

/// Placeholder for strips without a switchable supply
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerRail;

impl ErrorType for NoPowerRail {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPowerRail {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn switch_power<P: OutputPin>(pin: &mut P, on: bool) {
    let result = if on { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        #[cfg(feature = "esp32-log")]
        esp_println::println!("[ledstrip] power rail switch failed");
    }
}

/// Three bytes per pixel strip (WS2812 and friends)
pub struct RgbStrip<W, P = NoPowerRail> {
    writer: W,
    power: P,
}

impl<W> RgbStrip<W, NoPowerRail>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    /// Create a new strip output without power control
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            power: NoPowerRail,
        }
    }
}

impl<W, P> RgbStrip<W, P>
where
    W: SmartLedsWrite<Color = RGB8>,
    P: OutputPin,
{
    /// Create a new strip output whose supply is switched by `power`
    pub fn with_power(writer: W, power: P) -> Self {
        Self { writer, power }
    }

    pub fn release(self) -> (W, P) {
        (self.writer, self.power)
    }
}

impl<W, P> StripOutput for RgbStrip<W, P>
where
    W: SmartLedsWrite<Color = RGB8>,
    P: OutputPin,
{
    fn refresh(&mut self, pixels: &[u8], bpp: usize) -> Result<(), StripError> {
        if bpp != 3 {
            return Err(StripError::UnsupportedBpp(u8::try_from(bpp).unwrap_or(u8::MAX)));
        }
        let colors = pixels.chunks_exact(3).map(|p| RGB8::new(p[0], p[1], p[2]));
        self.writer.write(colors).map_err(|_| StripError::WriteFailed)
    }

    fn set_power(&mut self, on: bool) {
        switch_power(&mut self.power, on);
    }
}

/// Four bytes per pixel strip (SK6812 RGBW and friends)
pub struct RgbwStrip<W, P = NoPowerRail> {
    writer: W,
    power: P,
}

impl<W> RgbwStrip<W, NoPowerRail>
where
    W: SmartLedsWrite<Color = RGBW<u8>>,
{
    /// Create a new strip output without power control
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            power: NoPowerRail,
        }
    }
}

impl<W, P> RgbwStrip<W, P>
where
    W: SmartLedsWrite<Color = RGBW<u8>>,
    P: OutputPin,
{
    /// Create a new strip output whose supply is switched by `power`
    pub fn with_power(writer: W, power: P) -> Self {
        Self { writer, power }
    }

    pub fn release(self) -> (W, P) {
        (self.writer, self.power)
    }
}

impl<W, P> StripOutput for RgbwStrip<W, P>
where
    W: SmartLedsWrite<Color = RGBW<u8>>,
    P: OutputPin,
{
    fn refresh(&mut self, pixels: &[u8], bpp: usize) -> Result<(), StripError> {
        if bpp != 4 {
            return Err(StripError::UnsupportedBpp(u8::try_from(bpp).unwrap_or(u8::MAX)));
        }
        let colors = pixels.chunks_exact(4).map(|p| RGBW::<u8> {
            r: p[0],
            g: p[1],
            b: p[2],
            a: White(p[3]),
        });
        self.writer.write(colors).map_err(|_| StripError::WriteFailed)
    }

    fn set_power(&mut self, on: bool) {
        switch_power(&mut self.power, on);
    }
}
