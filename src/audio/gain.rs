// Gain automation for a single voice
// Mirrors the audio-graph model: a value that can be set at a time or
// ramped linearly towards a target ending at a later time

/// One linear segment; before `from_time` the value is `from`,
/// after `to_time` it holds at `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainAutomation {
    from: f32,
    from_time: f64,
    to: f32,
    to_time: f64,
}

impl GainAutomation {
    pub fn constant(value: f32) -> Self {
        Self {
            from: value,
            from_time: 0.0,
            to: value,
            to_time: 0.0,
        }
    }

    /// Gain at engine time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        if t >= self.to_time {
            return self.to;
        }
        if t <= self.from_time {
            return self.from;
        }
        let span = self.to_time - self.from_time;
        let progress = ((t - self.from_time) / span) as f32;
        self.from + (self.to - self.from) * progress
    }

    /// Jump to `value` at time `at`, dropping any scheduled ramp
    pub fn set_value_at(&mut self, value: f32, at: f64) {
        *self = Self {
            from: value,
            from_time: at,
            to: value,
            to_time: at,
        };
    }

    /// Ramp from whatever the gain is at `now` to `target` at `end_time`
    pub fn linear_ramp_to(&mut self, target: f32, now: f64, end_time: f64) {
        let start = self.value_at(now);
        if end_time <= now {
            self.set_value_at(target, now);
            return;
        }
        *self = Self {
            from: start,
            from_time: now,
            to: target,
            to_time: end_time,
        };
    }

    /// Freeze the gain at its current value; returns that value
    pub fn cancel_and_hold(&mut self, now: f64) -> f32 {
        let value = self.value_at(now);
        self.set_value_at(value, now);
        value
    }

    /// Time at which the current ramp settles
    pub fn settles_at(&self) -> f64 {
        self.to_time
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_linear_ramp() {
        let mut gain = GainAutomation::constant(0.0);
        gain.linear_ramp_to(1.0, 2.0, 3.5);

        assert!(approx(gain.value_at(1.0), 0.0));
        assert!(approx(gain.value_at(2.0), 0.0));
        assert!(approx(gain.value_at(2.75), 0.5));
        assert!(approx(gain.value_at(3.5), 1.0));
        assert!(approx(gain.value_at(100.0), 1.0));
    }

    #[test]
    fn test_ramp_starts_from_current_value() {
        let mut gain = GainAutomation::constant(0.0);
        gain.linear_ramp_to(1.0, 0.0, 2.0);
        // Interrupt the fade-in halfway with a fade-out
        gain.linear_ramp_to(0.0, 1.0, 2.0);

        assert!(approx(gain.value_at(1.0), 0.5));
        assert!(approx(gain.value_at(1.5), 0.25));
        assert!(approx(gain.value_at(2.0), 0.0));
        assert_eq!(gain.settles_at(), 2.0);
        assert_eq!(gain.target(), 0.0);
    }

    #[test]
    fn test_zero_length_ramp_jumps() {
        let mut gain = GainAutomation::constant(0.3);
        gain.linear_ramp_to(1.0, 5.0, 5.0);
        assert!(approx(gain.value_at(5.0), 1.0));
    }

    #[test]
    fn test_cancel_and_hold() {
        let mut gain = GainAutomation::constant(0.0);
        gain.linear_ramp_to(1.0, 0.0, 4.0);
        let held = gain.cancel_and_hold(1.0);

        assert!(approx(held, 0.25));
        assert!(approx(gain.value_at(3.0), 0.25));
    }
}
