use embassy_time::{Duration, Instant};

/// Time elapsed from `since` to `now`, zero if `now` is earlier.
pub(crate) fn elapsed(now: Instant, since: Instant) -> Duration {
    if now <= since {
        Duration::from_ticks(0)
    } else {
        now.duration_since(since)
    }
}

/// One evaluation of a [`LevelAnimator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Interpolated level in `[0, 1]`
    pub level: f32,
    /// Level with gamma applied, ready for hardware
    pub output: f32,
    /// True on the tick where the animation reached its target
    pub settled: bool,
}

/// Time-interpolated light level shared by every dimmer variant.
///
/// A full 0 to 1 sweep takes the configured duration; smaller moves take
/// proportionally less time.
#[derive(Debug, Clone)]
pub struct LevelAnimator {
    /// Duration of a full 0 to 1 sweep
    sweep: Duration,
    /// Output exponent, 1.0 is linear
    gamma: f32,
    /// Last interpolated level
    current: f32,
    /// Level at the start of the running animation
    prev: f32,
    /// Level the running animation heads for
    target: f32,
    /// Start and end of the running animation
    window: Option<(Instant, Instant)>,
}

impl LevelAnimator {
    /// Create a new animator resting at level 0
    pub const fn new(sweep: Duration, gamma: f32) -> Self {
        Self {
            sweep,
            gamma,
            current: 0.0,
            prev: 0.0,
            target: 0.0,
            window: None,
        }
    }

    /// Get the last interpolated level
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Get the level the animator is heading for
    pub const fn target(&self) -> f32 {
        self.target
    }

    /// Check if an animation is in progress
    pub const fn is_animating(&self) -> bool {
        self.window.is_some()
    }

    /// Get the start and end of the running animation
    pub const fn window(&self) -> Option<(Instant, Instant)> {
        self.window
    }

    pub const fn sweep(&self) -> Duration {
        self.sweep
    }

    pub fn set_sweep(&mut self, sweep: Duration) {
        self.sweep = sweep;
    }

    pub const fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma;
    }

    /// Jump to `level` without animating.
    pub fn reset(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.current = level;
        self.prev = level;
        self.target = level;
        self.window = None;
    }

    /// Start animating towards `target` (or 0 when `is_on` is false).
    ///
    /// Animation starts from the current interpolated level, so retriggering
    /// mid-animation never jumps. A running animation towards the same
    /// target keeps its window. Returns the time left until the target.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn start(&mut self, target: f32, is_on: bool, now: Instant) -> Duration {
        let target = if is_on { target.clamp(0.0, 1.0) } else { 0.0 };
        if let Some((_, end)) = self.window {
            if libm::fabsf(target - self.target) <= f32::EPSILON {
                return elapsed(end, now);
            }
        }
        self.prev = self.current;
        self.target = target;

        let distance = libm::fabsf(target - self.prev);
        let length = Duration::from_micros((self.sweep.as_micros() as f32 * distance) as u64);
        self.window = Some((now, now + length));
        length
    }

    /// Evaluate the animation at `now`.
    #[allow(clippy::cast_precision_loss)]
    pub fn tick(&mut self, now: Instant) -> AnimationFrame {
        let Some((start, end)) = self.window else {
            return self.frame(false);
        };

        let length = elapsed(end, start).as_micros().max(1_000);
        let progress = (elapsed(now, start).as_micros() as f32 / length as f32).clamp(0.0, 1.0);

        if progress >= 1.0 {
            self.current = self.target;
            self.prev = self.target;
            self.window = None;
            return self.frame(true);
        }

        let level = self.prev + (self.target - self.prev) * progress;
        self.current = level.clamp(0.0, 1.0);
        self.frame(false)
    }

    /// Apply gamma to `level`
    pub fn apply_gamma(&self, level: f32) -> f32 {
        if self.gamma > 0.0 && libm::fabsf(self.gamma - 1.0) > f32::EPSILON {
            libm::powf(level, self.gamma)
        } else {
            level
        }
    }

    fn frame(&self, settled: bool) -> AnimationFrame {
        AnimationFrame {
            level: self.current,
            output: self.apply_gamma(self.current),
            settled,
        }
    }
}
