use embassy_time::Instant;
use heapless::Vec;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use super::{DimmerContext, DimmerCore, DimmerEvent, DimmerRequest, DimmerState, IdentifyFlash, StripState};
use crate::StripOutput;
use crate::color::Colorspace;
use crate::config::{
    ConfigStore, DEFAULT_TEMPERATURE, MAX_PIXEL_BYTES, MAX_PIXELS, load_f32, save_f32,
};
use crate::curve::ColorCurveEngine;
use crate::error::StripError;

struct AttachedStrip<S> {
    output: S,
    bpp: usize,
    powered: bool,
}

impl<S: StripOutput> AttachedStrip<S> {
    /// Write a frame; the rail is powered before a lit frame and cut
    /// after a dark one
    fn flush(&mut self, pixels: &[u8]) {
        let lit = pixels.iter().any(|b| *b != 0);
        if lit && !self.powered {
            self.output.set_power(true);
            self.powered = true;
        }
        if let Err(_e) = self.output.refresh(pixels, self.bpp) {
            #[cfg(feature = "esp32-log")]
            println!("[ledstrip] refresh failed: {}", _e);
        }
        if !lit && self.powered {
            self.output.set_power(false);
            self.powered = false;
        }
    }
}

/// Dimmer driving an addressable RGB or RGBW strip with color-accurate
/// white and a focal brightness curve
pub struct LedstripDimmer<S: StripOutput> {
    core: DimmerCore,
    engine: ColorCurveEngine,
    strip: Option<AttachedStrip<S>>,
    pixels: Vec<u8, MAX_PIXEL_BYTES>,
    levels: Vec<f32, MAX_PIXELS>,
    identify: Option<IdentifyFlash>,
    /// Render on the next tick even without an animation
    refresh_pending: bool,
}

impl<S: StripOutput> LedstripDimmer<S> {
    /// Create a new strip dimmer; output starts once a strip is attached
    pub fn new(num: u8) -> Self {
        Self {
            core: DimmerCore::new(num).with_temperature(),
            engine: ColorCurveEngine::new(Colorspace::default(), DEFAULT_TEMPERATURE),
            strip: None,
            pixels: Vec::new(),
            levels: Vec::new(),
            identify: None,
            refresh_pending: false,
        }
    }

    pub const fn core(&self) -> &DimmerCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DimmerCore {
        &mut self.core
    }

    pub const fn engine(&self) -> &ColorCurveEngine {
        &self.engine
    }

    /// Current pixel bytes, `bpp` per pixel in R, G, B(, W) order
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub const fn is_attached(&self) -> bool {
        self.strip.is_some()
    }

    pub fn output(&self) -> Option<&S> {
        self.strip.as_ref().map(|s| &s.output)
    }

    /// Start driving `output`, a strip of `count` pixels with `bpp` bytes
    /// each.
    ///
    /// A strip that does not fit the pixel buffer is refused and the dimmer
    /// keeps rendering nothing.
    pub fn attach(&mut self, output: S, count: usize, bpp: u8, ctx: &mut DimmerContext<'_>) -> Result<(), StripError> {
        if bpp != 3 && bpp != 4 {
            return Err(StripError::UnsupportedBpp(bpp));
        }
        let bpp = usize::from(bpp);
        if count > MAX_PIXELS || count * bpp > MAX_PIXEL_BYTES {
            #[cfg(feature = "esp32-log")]
            println!("[ledstrip] {} pixels do not fit the buffer", count);
            return Err(StripError::BufferTooSmall);
        }

        self.pixels.clear();
        self.levels.clear();
        self.pixels
            .resize(count * bpp, 0)
            .map_err(|()| StripError::BufferTooSmall)?;
        self.levels
            .resize(count, 0.0)
            .map_err(|()| StripError::BufferTooSmall)?;
        self.strip = Some(AttachedStrip {
            output,
            bpp,
            powered: false,
        });
        self.refresh_pending = true;
        self.update_dimmer(ctx);
        Ok(())
    }

    /// Stop driving the strip and hand it back
    pub fn detach(&mut self) -> Option<S> {
        self.pixels.clear();
        self.levels.clear();
        self.strip.take().map(|s| s.output)
    }

    pub fn update_dimmer(&mut self, ctx: &mut DimmerContext<'_>) {
        if let Some(temperature) = self.core.temperature() {
            self.engine.set_temperature(temperature);
        }
        self.refresh_pending = true;
        self.core.start_animation(ctx.now, ctx.sleep);
        ctx.events.emit(DimmerEvent::ValueChanged(self.core.num()));
    }

    pub fn identify(&mut self, now: Instant) {
        self.identify = Some(IdentifyFlash::new(now));
    }

    pub fn tick(&mut self, ctx: &mut DimmerContext<'_>) {
        let Some(strip) = self.strip.as_mut() else {
            return;
        };

        if let Some(flash) = self.identify {
            match flash.step(ctx.now) {
                Some(on) => {
                    self.pixels.fill(if on { u8::MAX } else { 0 });
                    strip.flush(&self.pixels);
                    return;
                }
                None => {
                    self.identify = None;
                    self.update_dimmer(ctx);
                    return;
                }
            }
        }

        if !self.core.animator().is_animating() && !self.refresh_pending {
            return;
        }

        let gamma = self.core.animator().gamma();
        let frame = self.core.animator_mut().tick(ctx.now);
        let changed = self
            .engine
            .render(frame.level, gamma, strip.bpp, &mut self.levels, &mut self.pixels);
        if changed || self.refresh_pending {
            strip.flush(&self.pixels);
        }
        self.refresh_pending = false;

        if frame.settled {
            ctx.events.emit(DimmerEvent::ValueChanged(self.core.num()));
        }
    }

    /// Apply the strip-only request fields, returns `(light, config)`
    pub(crate) fn apply_strip(&mut self, request: &DimmerRequest) -> (bool, bool) {
        let mut changed = false;

        if request.white_temperature.is_some() || request.white_brightness.is_some() {
            let current = self.engine.colorspace();
            let temperature = request
                .white_temperature
                .filter(|t| t.is_finite() && *t > 0.0)
                .unwrap_or(current.white_temperature());
            let brightness = request
                .white_brightness
                .filter(|b| b.is_finite())
                .unwrap_or(current.white_brightness());
            self.engine.set_colorspace(Colorspace::new(temperature, brightness));
            changed = true;
        }

        let params = self.engine.params_mut();
        if let Some(point) = request.focal_point.filter(|v| v.is_finite()) {
            params.focal_point = point.clamp(0.0, 1.0);
            changed = true;
        }
        if let Some(spread) = request.focal_spread.filter(|v| v.is_finite()) {
            params.focal_spread = spread.clamp(0.0, 1.0);
            changed = true;
        }
        if let Some(mode) = request.calibration_mode {
            params.calibration = mode;
            changed = true;
        }
        if let Some(data) = &request.calibration_data {
            params.set_calibration_data(data);
            changed = true;
        }

        if changed {
            self.refresh_pending = true;
        }
        (changed, changed)
    }

    pub fn state(&self) -> DimmerState {
        let colorspace = self.engine.colorspace();
        let params = self.engine.params();
        let mut state = self.core.state(self.is_attached());
        state.strip = Some(StripState {
            white_temperature: colorspace.white_temperature(),
            white_brightness: colorspace.white_brightness(),
            focal_point: params.focal_point,
            focal_spread: params.focal_spread,
            max_level_correct_color: self.engine.max_correct_level(),
            calibration_mode: params.calibration,
        });
        state
    }

    pub fn load<C: ConfigStore + ?Sized>(&mut self, store: &C, prefix: &str) {
        self.core.load(store, prefix);
        let current = *self.engine.colorspace();
        let colorspace = Colorspace::new(
            load_f32(store, prefix, "whiteTemperature", current.white_temperature()),
            load_f32(store, prefix, "whiteBrightness", current.white_brightness()),
        );
        self.engine.set_colorspace(colorspace);
        if let Some(temperature) = self.core.temperature() {
            self.engine.set_temperature(temperature);
        }
        let params = self.engine.params_mut();
        params.focal_point = load_f32(store, prefix, "focalPoint", params.focal_point).clamp(0.0, 1.0);
        params.focal_spread = load_f32(store, prefix, "focalSpread", params.focal_spread).clamp(0.0, 1.0);
    }

    pub fn save<C: ConfigStore + ?Sized>(&self, store: &mut C, prefix: &str) {
        self.core.save(store, prefix);
        let colorspace = self.engine.colorspace();
        let params = self.engine.params();
        save_f32(store, prefix, "whiteTemperature", colorspace.white_temperature());
        save_f32(store, prefix, "whiteBrightness", colorspace.white_brightness());
        save_f32(store, prefix, "focalPoint", params.focal_point);
        save_f32(store, prefix, "focalSpread", params.focal_spread);
    }
}
