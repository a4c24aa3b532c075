use embassy_time::Instant;

use crate::animator::elapsed;
use crate::config::IDENTIFY_STEP;

/// Non-blocking on/off/on/off flash used by `identify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifyFlash {
    started: Instant,
}

impl IdentifyFlash {
    pub const fn new(now: Instant) -> Self {
        Self { started: now }
    }

    /// Whether the light is on at `now`, `None` once the flash is over
    pub fn step(&self, now: Instant) -> Option<bool> {
        let step = elapsed(now, self.started).as_millis() / IDENTIFY_STEP.as_millis().max(1);
        match step {
            0 | 2 => Some(true),
            1 | 3 => Some(false),
            _ => None,
        }
    }
}
