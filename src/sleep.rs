//! Hooks into the application's low-power sleep manager.

use embassy_time::Duration;

/// Sleep manager hooks.
///
/// Called whenever an in-flight operation must not be interrupted by a
/// low-power sleep: animations, BLE transmits and scan sessions.
pub trait SleepControl {
    /// Do not sleep for at least `duration` from now.
    fn postpone_sleep(&mut self, duration: Duration);
    /// Do not sleep until [`SleepControl::resume_sleep`] is called.
    fn pause_sleep(&mut self);
    /// Undo one [`SleepControl::pause_sleep`].
    fn resume_sleep(&mut self);
}

/// Sleep manager for always-powered devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSleep;

impl SleepControl for NeverSleep {
    fn postpone_sleep(&mut self, _duration: Duration) {}
    fn pause_sleep(&mut self) {}
    fn resume_sleep(&mut self) {}
}
