//! Local controls: buttons and rotary encoders.
//!
//! Input drivers push [`InputEvent`]s, possibly from interrupt context. The
//! [`InputProcessor`] drains them on the next tick and turns each into a
//! [`DimmerRequest`] for the selected dimmer.

use embedded_hal::pwm::SetDutyCycle;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::StripOutput;
use crate::channel::{Channel, Receiver, Sender};
use crate::collection::DimmerCollection;
use crate::config::{LEVEL_STEP, TEMPERATURE_MAX, TEMPERATURE_MIN, TEMPERATURE_STEP};
use crate::dimmer::{DimmerContext, DimmerCore, DimmerRequest};

/// Capacity of the input event queue.
pub const INPUT_QUEUE: usize = 8;

/// A local control action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Button press: switch on or off
    Toggle,
    /// Encoder step: brighter, switching on
    LevelUp,
    /// Encoder step: dimmer
    LevelDown,
    /// Encoder step: cooler white
    TemperatureUp,
    /// Encoder step: warmer white
    TemperatureDown,
    /// Flash the selected dimmer
    Identify,
    /// Move the selection to the next dimmer
    NextDimmer,
}

pub type InputChannel = Channel<InputEvent, INPUT_QUEUE>;
pub type InputSender<'a> = Sender<'a, InputEvent, INPUT_QUEUE>;
pub type InputReceiver<'a> = Receiver<'a, InputEvent, INPUT_QUEUE>;

/// Request that `event` makes of a dimmer in state `core`
pub fn request_for(event: InputEvent, core: &DimmerCore) -> Option<DimmerRequest> {
    let request = match event {
        InputEvent::Toggle => DimmerRequest::on(!core.is_on()),
        InputEvent::LevelUp => DimmerRequest {
            is_on: Some(true),
            level: Some((core.level() + LEVEL_STEP).min(1.0)),
            ..DimmerRequest::default()
        },
        InputEvent::LevelDown => DimmerRequest::level((core.level() - LEVEL_STEP).max(0.0)),
        InputEvent::TemperatureUp | InputEvent::TemperatureDown => {
            let step = if event == InputEvent::TemperatureUp {
                TEMPERATURE_STEP
            } else {
                -TEMPERATURE_STEP
            };
            let temperature = core.temperature()?;
            DimmerRequest {
                temperature: Some((temperature + step).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX)),
                ..DimmerRequest::default()
            }
        }
        InputEvent::Identify => DimmerRequest {
            identify: true,
            ..DimmerRequest::default()
        },
        InputEvent::NextDimmer => return None,
    };
    Some(request)
}

/// Applies queued input events to the selected dimmer
pub struct InputProcessor<'a> {
    events: InputReceiver<'a>,
    selected: usize,
}

impl<'a> InputProcessor<'a> {
    /// Create a new processor draining `events`; dimmer 0 starts selected
    pub const fn new(events: InputReceiver<'a>) -> Self {
        Self {
            events,
            selected: 0,
        }
    }

    /// Index of the dimmer the controls act on
    pub const fn selected(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
    }

    /// Drain every queued event (non-blocking).
    ///
    /// Returns true if some configuration changed and should be saved.
    pub fn process_pending<P: SetDutyCycle, S: StripOutput>(
        &mut self,
        dimmers: &mut DimmerCollection<P, S>,
        ctx: &mut DimmerContext<'_>,
    ) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events.try_receive() {
            if dimmers.is_empty() {
                continue;
            }
            if self.selected >= dimmers.len() {
                self.selected = 0;
            }
            if event == InputEvent::NextDimmer {
                self.selected = (self.selected + 1) % dimmers.len();
                #[cfg(feature = "esp32-log")]
                println!("[input] selected dimmer {}", self.selected);
                continue;
            }
            let Some(dimmer) = dimmers.at_mut(self.selected) else {
                continue;
            };
            if let Some(request) = request_for(event, dimmer.core()) {
                changed |= dimmer.apply_request(&request, ctx);
            }
        }
        changed
    }
}
