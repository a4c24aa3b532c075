use embassy_time::Instant;
use embedded_hal::pwm::SetDutyCycle;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use super::{DimmerContext, DimmerCore, DimmerEvent, IdentifyFlash};
use crate::config::{IDENTIFY_PWM_DUTY, PWM_LIT_SLEEP};

/// Dimmer driving a single PWM output
pub struct PwmDimmer<P: SetDutyCycle> {
    core: DimmerCore,
    pwm: P,
    identify: Option<IdentifyFlash>,
    /// Last duty written, in 1/255 steps
    duty: Option<u8>,
}

impl<P: SetDutyCycle> PwmDimmer<P> {
    /// Create a new PWM dimmer on `pwm`
    pub fn new(num: u8, pwm: P) -> Self {
        Self {
            core: DimmerCore::new(num).with_pwm_frequency(),
            pwm,
            identify: None,
            duty: None,
        }
    }

    pub const fn core(&self) -> &DimmerCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut DimmerCore {
        &mut self.core
    }

    pub const fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Last duty written, in 1/255 steps
    pub const fn duty(&self) -> Option<u8> {
        self.duty
    }

    pub fn update_dimmer(&mut self, ctx: &mut DimmerContext<'_>) {
        self.core.start_animation(ctx.now, ctx.sleep);
        ctx.events.emit(DimmerEvent::ValueChanged(self.core.num()));
    }

    pub fn identify(&mut self, now: Instant) {
        self.identify = Some(IdentifyFlash::new(now));
    }

    pub fn tick(&mut self, ctx: &mut DimmerContext<'_>) {
        if let Some(flash) = self.identify {
            match flash.step(ctx.now) {
                Some(on) => {
                    self.write_duty(if on { IDENTIFY_PWM_DUTY } else { 0 });
                    return;
                }
                None => {
                    self.identify = None;
                    self.duty = None;
                    self.update_dimmer(ctx);
                }
            }
        }

        if !self.core.animator().is_animating() {
            if self.core.is_on() && self.core.level() > 0.0 {
                ctx.sleep.postpone_sleep(PWM_LIT_SLEEP);
            }
            return;
        }

        let frame = self.core.animator_mut().tick(ctx.now);
        self.write_duty(duty_for(frame.output));
        if frame.settled {
            ctx.events.emit(DimmerEvent::ValueChanged(self.core.num()));
        }
    }

    fn write_duty(&mut self, duty: u8) {
        if self.duty == Some(duty) {
            return;
        }
        match self.pwm.set_duty_cycle_fraction(u16::from(duty), 255) {
            Ok(()) => self.duty = Some(duty),
            Err(_) => {
                #[cfg(feature = "esp32-log")]
                println!("[dimmer{}] pwm write failed", self.core.num());
            }
        }
    }
}

/// Map a level in `[0, 1]` to 8-bit duty, truncating
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn duty_for(level: f32) -> u8 {
    (255.0 * level.clamp(0.0, 1.0)) as u8
}
