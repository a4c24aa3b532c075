//! Dimmers: one controllable light each.
//!
//! Every variant shares a [`DimmerCore`] with the user-visible state and a
//! [`LevelAnimator`]. Variants differ in how a level reaches the light: a
//! PWM pin, a remote BLE dimmer or an addressable LED strip.

mod ble;
mod identify;
mod ledstrip;
mod pwm;
mod request;

use core::fmt::Write;

use embassy_time::{Duration, Instant};
use embedded_hal::pwm::SetDutyCycle;
use heapless::{Deque, String};

#[cfg(feature = "esp32-log")]
use esp_println::println;

pub use ble::BleDimmer;
pub use identify::IdentifyFlash;
pub use ledstrip::LedstripDimmer;
pub use pwm::PwmDimmer;
pub use request::{DimmerRequest, DimmerState, RemoteState, StripState};

use crate::StripOutput;
use crate::animator::LevelAnimator;
use crate::ble::{BleHost, DeviceName, device_name};
use crate::config::{
    ANIMATION_SLEEP_MARGIN, ConfigStore, DEFAULT_ANIMATION_MS, DEFAULT_GAMMA, DEFAULT_LEVEL,
    DEFAULT_MIN_LEVEL, DEFAULT_PWM_FREQUENCY, DEFAULT_TEMPERATURE, NAME_LEN, load_f32,
    load_i32, load_str, save_f32, save_i32, save_str,
};
use crate::sleep::SleepControl;

/// Capacity of the dimmer event queue.
pub const DIMMER_EVENT_QUEUE: usize = 16;

/// Something a dimmer reports to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimmerEvent {
    /// Level or on/off state changed, or settled after an animation
    ValueChanged(u8),
    /// The dimmer became reachable or unreachable
    AvailableChanged(u8),
    /// A pending transmit was given up
    TransmitAbandoned(u8),
}

/// Outgoing dimmer events; the oldest is dropped when full.
#[derive(Debug, Default)]
pub struct DimmerEvents {
    queue: Deque<DimmerEvent, DIMMER_EVENT_QUEUE>,
}

impl DimmerEvents {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    pub fn emit(&mut self, event: DimmerEvent) {
        if self.queue.is_full() {
            self.queue.pop_front();
        }
        let _ = self.queue.push_back(event);
    }

    pub fn poll(&mut self) -> Option<DimmerEvent> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimmerEvent> {
        self.queue.iter()
    }
}

/// Everything a dimmer may touch besides itself during a call
pub struct DimmerContext<'c> {
    pub now: Instant,
    pub sleep: &'c mut dyn SleepControl,
    /// BLE client, when the application has one
    pub ble: Option<&'c mut dyn BleHost>,
    pub events: &'c mut DimmerEvents,
}

impl<'c> DimmerContext<'c> {
    pub fn new(now: Instant, sleep: &'c mut dyn SleepControl, events: &'c mut DimmerEvents) -> Self {
        Self {
            now,
            sleep,
            ble: None,
            events,
        }
    }

    #[must_use]
    pub fn with_ble(mut self, ble: &'c mut dyn BleHost) -> Self {
        self.ble = Some(ble);
        self
    }
}

/// State shared by all dimmer variants
#[derive(Debug, Clone)]
pub struct DimmerCore {
    num: u8,
    name: DeviceName,
    is_on: bool,
    level: f32,
    min_level: f32,
    /// Only for dimmers that support color temperature
    temperature: Option<f32>,
    /// Only for dimmers with a PWM output
    pwm_frequency: Option<f32>,
    animator: LevelAnimator,
}

impl DimmerCore {
    /// Create a new dimmer core with default settings
    pub fn new(num: u8) -> Self {
        Self {
            num,
            name: DeviceName::new(),
            is_on: false,
            level: DEFAULT_LEVEL,
            min_level: DEFAULT_MIN_LEVEL,
            temperature: None,
            pwm_frequency: None,
            animator: LevelAnimator::new(
                Duration::from_millis(u64::from(DEFAULT_ANIMATION_MS)),
                DEFAULT_GAMMA,
            ),
        }
    }

    #[must_use]
    pub fn with_temperature(mut self) -> Self {
        self.temperature = Some(DEFAULT_TEMPERATURE);
        self
    }

    #[must_use]
    pub fn with_pwm_frequency(mut self) -> Self {
        self.pwm_frequency = Some(DEFAULT_PWM_FREQUENCY);
        self
    }

    pub const fn num(&self) -> u8 {
        self.num
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured name, or the dimmer number when none is set
    pub fn user_visible_name(&self) -> String<NAME_LEN> {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        let mut name = String::new();
        let _ = write!(name, "{}", self.num);
        name
    }

    pub const fn is_on(&self) -> bool {
        self.is_on
    }

    pub const fn level(&self) -> f32 {
        self.level
    }

    pub const fn min_level(&self) -> f32 {
        self.min_level
    }

    pub const fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub const fn pwm_frequency(&self) -> Option<f32> {
        self.pwm_frequency
    }

    pub const fn animator(&self) -> &LevelAnimator {
        &self.animator
    }

    pub fn animator_mut(&mut self) -> &mut LevelAnimator {
        &mut self.animator
    }

    /// Animation length of a full sweep in milliseconds
    #[allow(clippy::cast_possible_truncation)]
    pub fn animation_ms(&self) -> u32 {
        self.animator.sweep().as_millis().min(u64::from(u32::MAX)) as u32
    }

    pub fn set_on(&mut self, is_on: bool) -> bool {
        let changed = self.is_on != is_on;
        self.is_on = is_on;
        changed
    }

    /// Set the level, clamped to `[min_level, 1]`
    pub fn set_level(&mut self, level: f32) -> bool {
        if !level.is_finite() {
            return false;
        }
        let level = level.clamp(self.min_level, 1.0);
        let changed = libm::fabsf(self.level - level) > f32::EPSILON;
        self.level = level;
        changed
    }

    /// Set the minimum level; a level below it is raised to match
    pub fn set_min_level(&mut self, min_level: f32) -> bool {
        if !min_level.is_finite() {
            return false;
        }
        self.min_level = min_level.clamp(0.0, 1.0);
        let level = self.level.max(self.min_level);
        let changed = libm::fabsf(self.level - level) > f32::EPSILON;
        self.level = level;
        changed
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        if gamma.is_finite() && gamma > 0.0 {
            self.animator.set_gamma(gamma);
        }
    }

    pub fn set_animation_ms(&mut self, ms: u32) {
        self.animator.set_sweep(Duration::from_millis(u64::from(ms)));
    }

    /// Ignored by dimmers without color temperature
    pub fn set_temperature(&mut self, temperature: f32) -> bool {
        match self.temperature.as_mut() {
            Some(current) if temperature.is_finite() && temperature > 0.0 => {
                let changed = libm::fabsf(*current - temperature) > f32::EPSILON;
                *current = temperature;
                changed
            }
            _ => false,
        }
    }

    /// Ignored by dimmers without a PWM output
    pub fn set_pwm_frequency(&mut self, frequency: f32) -> bool {
        match self.pwm_frequency.as_mut() {
            Some(current) if frequency.is_finite() && frequency > 0.0 => {
                *current = frequency;
                true
            }
            _ => false,
        }
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        if self.name == name {
            return false;
        }
        self.name = device_name(name);
        true
    }

    /// Start animating towards the current target and keep the device
    /// awake until it is done.
    pub fn start_animation(&mut self, now: Instant, sleep: &mut dyn SleepControl) -> Duration {
        let length = self.animator.start(self.level, self.is_on, now);
        sleep.postpone_sleep(length + ANIMATION_SLEEP_MARGIN);
        length
    }

    /// Apply the fields every variant understands.
    ///
    /// Returns `(light_changed, config_changed)`. The name is left to the
    /// variant since BLE dimmers must re-register it.
    fn apply_common(&mut self, request: &DimmerRequest) -> (bool, bool) {
        let mut light = false;
        let mut config = false;

        if let Some(min_level) = request.min_level {
            light |= self.set_min_level(min_level);
            config = true;
        }
        if let Some(gamma) = request.gamma {
            self.set_gamma(gamma);
            config = true;
        }
        if let Some(ms) = request.animation_ms {
            self.set_animation_ms(ms);
            config = true;
        }
        if let Some(frequency) = request.pwm_frequency {
            config |= self.set_pwm_frequency(frequency);
        }
        if let Some(is_on) = request.is_on {
            light |= self.set_on(is_on);
        }
        if let Some(level) = request.level {
            light |= self.set_level(level);
        }
        if let Some(temperature) = request.temperature {
            light |= self.set_temperature(temperature);
        }
        (light, config)
    }

    fn state(&self, available: bool) -> DimmerState {
        DimmerState {
            num: self.num,
            name: self.name.clone(),
            available,
            is_on: self.is_on,
            level: self.level,
            min_level: self.min_level,
            gamma: self.animator.gamma(),
            animation_ms: self.animation_ms(),
            temperature: self.temperature,
            pwm_frequency: self.pwm_frequency,
            strip: None,
            remote: None,
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn load<S: ConfigStore + ?Sized>(&mut self, store: &S, prefix: &str) {
        if let Some(name) = load_str(store, prefix, "name") {
            self.name = name;
        }
        self.is_on = load_i32(store, prefix, "isOn", 0) != 0;
        self.min_level = load_f32(store, prefix, "minLevel", self.min_level).clamp(0.0, 1.0);
        self.level = load_f32(store, prefix, "level", self.level).clamp(self.min_level, 1.0);
        self.set_gamma(load_f32(store, prefix, "gamma", self.animator.gamma()));
        let ms = load_i32(store, prefix, "animation", DEFAULT_ANIMATION_MS as i32).max(0);
        self.set_animation_ms(ms as u32);
        if let Some(temperature) = self.temperature {
            self.set_temperature(load_f32(store, prefix, "temperature", temperature));
        }
        if let Some(frequency) = self.pwm_frequency {
            self.set_pwm_frequency(load_f32(store, prefix, "pwmFrequency", frequency));
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn save<S: ConfigStore + ?Sized>(&self, store: &mut S, prefix: &str) {
        save_str(store, prefix, "name", &self.name);
        save_i32(store, prefix, "isOn", i32::from(self.is_on));
        save_f32(store, prefix, "level", self.level);
        save_f32(store, prefix, "minLevel", self.min_level);
        save_f32(store, prefix, "gamma", self.animator.gamma());
        save_i32(store, prefix, "animation", self.animation_ms() as i32);
        if let Some(temperature) = self.temperature {
            save_f32(store, prefix, "temperature", temperature);
        }
        if let Some(frequency) = self.pwm_frequency {
            save_f32(store, prefix, "pwmFrequency", frequency);
        }
    }
}

/// One dimmer of any kind
pub enum Dimmer<P: SetDutyCycle, S: StripOutput> {
    Pwm(PwmDimmer<P>),
    Ble(BleDimmer),
    Ledstrip(LedstripDimmer<S>),
}

impl<P: SetDutyCycle, S: StripOutput> Dimmer<P, S> {
    pub fn core(&self) -> &DimmerCore {
        match self {
            Dimmer::Pwm(d) => d.core(),
            Dimmer::Ble(d) => d.core(),
            Dimmer::Ledstrip(d) => d.core(),
        }
    }

    pub fn core_mut(&mut self) -> &mut DimmerCore {
        match self {
            Dimmer::Pwm(d) => d.core_mut(),
            Dimmer::Ble(d) => d.core_mut(),
            Dimmer::Ledstrip(d) => d.core_mut(),
        }
    }

    pub fn num(&self) -> u8 {
        self.core().num()
    }

    /// Bring the output in line with the loaded configuration
    pub fn setup(&mut self, ctx: &mut DimmerContext<'_>) {
        match self {
            Dimmer::Pwm(d) => d.update_dimmer(ctx),
            Dimmer::Ble(d) => d.setup(ctx),
            Dimmer::Ledstrip(d) => d.update_dimmer(ctx),
        }
    }

    /// Push the current state to the light
    pub fn update_dimmer(&mut self, ctx: &mut DimmerContext<'_>) {
        match self {
            Dimmer::Pwm(d) => d.update_dimmer(ctx),
            Dimmer::Ble(d) => d.update_dimmer(ctx),
            Dimmer::Ledstrip(d) => d.update_dimmer(ctx),
        }
    }

    /// Advance animations and pending work
    pub fn tick(&mut self, ctx: &mut DimmerContext<'_>) {
        match self {
            Dimmer::Pwm(d) => d.tick(ctx),
            Dimmer::Ble(d) => d.tick(ctx),
            Dimmer::Ledstrip(d) => d.tick(ctx),
        }
    }

    /// Flash the light so the user can find it
    pub fn identify(&mut self, ctx: &mut DimmerContext<'_>) {
        match self {
            Dimmer::Pwm(d) => d.identify(ctx.now),
            Dimmer::Ble(d) => d.identify(ctx),
            Dimmer::Ledstrip(d) => d.identify(ctx.now),
        }
    }

    pub fn is_available(&self, ble: Option<&dyn BleHost>) -> bool {
        match self {
            Dimmer::Pwm(_) => true,
            Dimmer::Ble(d) => d.is_available(ble),
            Dimmer::Ledstrip(d) => d.is_attached(),
        }
    }

    pub fn state(&self, ble: Option<&dyn BleHost>) -> DimmerState {
        match self {
            Dimmer::Pwm(d) => d.core().state(true),
            Dimmer::Ble(d) => d.state(ble),
            Dimmer::Ledstrip(d) => d.state(),
        }
    }

    /// Apply a request from the web/API layer.
    ///
    /// Returns true if any configuration changed and should be saved.
    pub fn apply_request(&mut self, request: &DimmerRequest, ctx: &mut DimmerContext<'_>) -> bool {
        if request.identify {
            self.identify(ctx);
        }

        let (mut light, mut config) = self.core_mut().apply_common(request);
        if let Some(name) = &request.name {
            config |= if let Dimmer::Ble(d) = self {
                d.set_name(name, ctx.ble.as_deref_mut())
            } else {
                self.core_mut().set_name(name)
            };
        }
        if let Dimmer::Ledstrip(d) = self {
            let (strip_light, strip_config) = d.apply_strip(request);
            light |= strip_light;
            config |= strip_config;
        }

        #[cfg(feature = "esp32-log")]
        println!("[dimmer{}] request applied (light: {}, config: {})", self.num(), light, config);

        // Curve and gamma changes must reach the light too.
        if light || config {
            self.update_dimmer(ctx);
        }
        config || light
    }

    pub fn load<C: ConfigStore + ?Sized>(
        &mut self,
        store: &C,
        prefix: &str,
        ble: Option<&mut (dyn BleHost + '_)>,
    ) {
        match self {
            Dimmer::Pwm(d) => d.core_mut().load(store, prefix),
            Dimmer::Ble(d) => d.load(store, prefix, ble),
            Dimmer::Ledstrip(d) => d.load(store, prefix),
        }
    }

    pub fn save<C: ConfigStore + ?Sized>(&self, store: &mut C, prefix: &str, ble: Option<&dyn BleHost>) {
        match self {
            Dimmer::Pwm(d) => d.core().save(store, prefix),
            Dimmer::Ble(d) => d.save(store, prefix, ble),
            Dimmer::Ledstrip(d) => d.save(store, prefix),
        }
    }
}
