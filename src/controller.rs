//! Tick scheduling for the whole controller.
//!
//! Portable pacing without async/await or platform timers: the caller asks
//! for a tick, gets back the next deadline and sleeps until then.

use embassy_time::{Duration, Instant};
use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;

use crate::StripOutput;
use crate::animator::elapsed;
use crate::ble::{BleClient, BleHost, BleRadio};
use crate::collection::DimmerCollection;
use crate::config::{ConfigStore, MAX_DIMMERS};
use crate::dimmer::{DimmerContext, DimmerEvent, DimmerEvents, DimmerRequest, DimmerState};
use crate::error::Error;
use crate::input::InputProcessor;
use crate::sleep::SleepControl;

/// Default tick interval (100 Hz).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a controller tick.
#[derive(Debug, Clone, Copy)]
pub struct TickResult {
    /// The deadline for the next tick.
    pub next_deadline: Instant,
    /// How long to wait until the next tick (zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Drives the input queue, the BLE client and every dimmer, in that order.
///
/// # Usage
///
/// ```ignore
/// let mut controller = Controller::new(dimmers, input, Some(client));
///
/// loop {
///     let result = controller.tick(Instant::now(), &mut sleep_manager);
///     Timer::at(result.next_deadline).await;
/// }
/// ```
pub struct Controller<'a, R: BleRadio, P: SetDutyCycle, S: StripOutput> {
    dimmers: DimmerCollection<P, S>,
    ble: Option<BleClient<'a, R>>,
    input: InputProcessor<'a>,
    events: DimmerEvents,
    next_tick: Instant,
    tick_interval: Duration,
    config_dirty: bool,
}

impl<'a, R: BleRadio, P: SetDutyCycle, S: StripOutput> Controller<'a, R, P, S> {
    /// Create a new controller ticking every `DEFAULT_TICK_INTERVAL`
    pub fn new(dimmers: DimmerCollection<P, S>, input: InputProcessor<'a>, ble: Option<BleClient<'a, R>>) -> Self {
        Self::with_tick_interval(dimmers, input, ble, DEFAULT_TICK_INTERVAL)
    }

    /// Create a new controller with a custom tick interval
    pub fn with_tick_interval(
        dimmers: DimmerCollection<P, S>,
        input: InputProcessor<'a>,
        ble: Option<BleClient<'a, R>>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            dimmers,
            ble,
            input,
            events: DimmerEvents::new(),
            next_tick: Instant::from_millis(0),
            tick_interval,
            config_dirty: false,
        }
    }

    /// Bring every dimmer in line with its loaded configuration
    pub fn setup(&mut self, now: Instant, sleep: &mut dyn SleepControl) {
        let mut ctx = DimmerContext {
            now,
            sleep,
            ble: self.ble.as_mut().map(|b| b as &mut dyn BleHost),
            events: &mut self.events,
        };
        self.dimmers.setup(&mut ctx);
    }

    /// Run one tick and return timing information.
    ///
    /// The caller waits until `next_deadline` before ticking again.
    pub fn tick(&mut self, now: Instant, sleep: &mut dyn SleepControl) -> TickResult {
        // Skip the backlog after a long stall instead of catching up.
        if elapsed(now, self.next_tick) > self.tick_interval * 2 {
            self.next_tick = now;
        }

        {
            let mut ctx = DimmerContext {
                now,
                sleep: &mut *sleep,
                ble: self.ble.as_mut().map(|b| b as &mut dyn BleHost),
                events: &mut self.events,
            };
            self.config_dirty |= self.input.process_pending(&mut self.dimmers, &mut ctx);
        }

        if let Some(ble) = self.ble.as_mut() {
            ble.tick(now, &mut *sleep);
        }

        let mut ctx = DimmerContext {
            now,
            sleep,
            ble: self.ble.as_mut().map(|b| b as &mut dyn BleHost),
            events: &mut self.events,
        };
        self.dimmers.tick(&mut ctx);

        self.next_tick += self.tick_interval;
        TickResult {
            next_deadline: self.next_tick,
            sleep_duration: elapsed(self.next_tick, now),
        }
    }

    /// Apply an API request addressed to `dimmer<num>`
    pub fn apply_request(
        &mut self,
        ident: &str,
        request: &DimmerRequest,
        now: Instant,
        sleep: &mut dyn SleepControl,
    ) -> Result<bool, Error> {
        let mut ctx = DimmerContext {
            now,
            sleep,
            ble: self.ble.as_mut().map(|b| b as &mut dyn BleHost),
            events: &mut self.events,
        };
        let changed = self.dimmers.apply_request(ident, request, &mut ctx)?;
        self.config_dirty |= changed;
        Ok(changed)
    }

    /// State of every dimmer, for the API reply
    pub fn state(&self) -> Vec<DimmerState, MAX_DIMMERS> {
        let ble = self.ble.as_ref().map(|b| b as &dyn BleHost);
        self.dimmers.state(ble)
    }

    /// Next dimmer event for the application
    pub fn poll_event(&mut self) -> Option<DimmerEvent> {
        self.events.poll()
    }

    /// True if settings changed since the last save
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty || self.ble.as_ref().is_some_and(BleClient::is_dirty)
    }

    pub fn load<C: ConfigStore + ?Sized>(&mut self, store: &C) {
        if let Some(ble) = self.ble.as_mut() {
            ble.load(store, "bleClient");
        }
        let ble = self.ble.as_mut().map(|b| b as &mut dyn BleHost);
        self.dimmers.load(store, "", ble);
        self.config_dirty = false;
    }

    pub fn save<C: ConfigStore + ?Sized>(&mut self, store: &mut C) {
        if let Some(ble) = self.ble.as_mut() {
            ble.save(store, "bleClient");
        }
        let ble = self.ble.as_ref().map(|b| b as &dyn BleHost);
        self.dimmers.save(store, "", ble);
        self.config_dirty = false;
    }

    pub fn dimmers(&self) -> &DimmerCollection<P, S> {
        &self.dimmers
    }

    pub fn dimmers_mut(&mut self) -> &mut DimmerCollection<P, S> {
        &mut self.dimmers
    }

    pub fn ble(&self) -> Option<&BleClient<'a, R>> {
        self.ble.as_ref()
    }

    pub fn ble_mut(&mut self) -> Option<&mut BleClient<'a, R>> {
        self.ble.as_mut()
    }

    pub fn input(&self) -> &InputProcessor<'a> {
        &self.input
    }
}
