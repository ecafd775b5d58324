//! Timing configuration and unit conversion.
//!
//! A [`ServoConfig`] describes the compare timer's tick rate and the servo pulse
//! convention. Every conversion is integer arithmetic so that equal angles always
//! produce equal tick counts.

use crate::{Error, Result};

/// Maximum number of servos a driver holds unless another capacity is chosen.
pub const SERVO_MAX_NUM: usize = 9;

/// Default pulse width at 0° (microseconds).
pub const SERVO_MIN_PULSE_US_DEFAULT: u32 = 1_000;

/// Default pulse width at the maximum angle (microseconds).
pub const SERVO_MAX_PULSE_US_DEFAULT: u32 = 2_000;

/// Default maximum servo angle (degrees).
pub const SERVO_MAX_DEGREES_DEFAULT: u16 = 180;

/// Default PWM frame period (microseconds); every servo gets one pulse per frame.
pub const SERVO_FRAME_US_DEFAULT: u32 = 20_000;

/// Default minimum distance (ticks) between "now" and the frame boundary for the
/// boundary itself to be scheduled.
pub const SERVO_FRAME_HEADROOM_TICKS_DEFAULT: u32 = 50;

/// Default delay (ticks) used to start the next frame when the boundary is too close
/// or already past.
pub const SERVO_LATE_FRAME_DELAY_TICKS_DEFAULT: u32 = 20;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Timer and pulse configuration for a [`SoftServo`](crate::SoftServo).
///
/// Construct with [`ServoConfig::new`] and adjust with the `with_*` builders; all of
/// them are `const` so a configuration can live in a `static`.
///
/// ```rust
/// use soft_servo::ServoConfig;
///
/// // 16 MHz core clock, timer prescaler 8: two ticks per microsecond.
/// const CONFIG: ServoConfig = ServoConfig::new(16_000_000, 8);
///
/// assert_eq!(CONFIG.us_to_ticks(1_000), 2_000);
/// assert_eq!(CONFIG.angle_to_ticks(180), 4_000);
/// assert_eq!(CONFIG.frame_ticks(), 40_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoConfig {
    /// Clock feeding the timer prescaler (Hz).
    pub timer_frequency_hz: u32,
    /// Timer prescaler divisor.
    pub timer_prescaler: u32,
    /// Pulse width at 0° (microseconds).
    pub min_pulse_us: u32,
    /// Pulse width at [`max_degrees`](Self::max_degrees) (microseconds).
    pub max_pulse_us: u32,
    /// Largest accepted angle (degrees).
    pub max_degrees: u16,
    /// Frame period (microseconds).
    pub frame_us: u32,
    /// See [`SERVO_FRAME_HEADROOM_TICKS_DEFAULT`].
    pub frame_headroom_ticks: u32,
    /// See [`SERVO_LATE_FRAME_DELAY_TICKS_DEFAULT`].
    pub late_frame_delay_ticks: u32,
}

impl ServoConfig {
    /// Configuration with the standard 1–2 ms, 0–180°, 20 ms servo convention.
    #[must_use]
    pub const fn new(timer_frequency_hz: u32, timer_prescaler: u32) -> Self {
        Self {
            timer_frequency_hz,
            timer_prescaler,
            min_pulse_us: SERVO_MIN_PULSE_US_DEFAULT,
            max_pulse_us: SERVO_MAX_PULSE_US_DEFAULT,
            max_degrees: SERVO_MAX_DEGREES_DEFAULT,
            frame_us: SERVO_FRAME_US_DEFAULT,
            frame_headroom_ticks: SERVO_FRAME_HEADROOM_TICKS_DEFAULT,
            late_frame_delay_ticks: SERVO_LATE_FRAME_DELAY_TICKS_DEFAULT,
        }
    }

    /// Replace the pulse widths used at 0° and at the maximum angle.
    #[must_use]
    pub const fn with_pulse_range(mut self, min_pulse_us: u32, max_pulse_us: u32) -> Self {
        self.min_pulse_us = min_pulse_us;
        self.max_pulse_us = max_pulse_us;
        self
    }

    /// Replace the maximum angle.
    #[must_use]
    pub const fn with_max_degrees(mut self, max_degrees: u16) -> Self {
        self.max_degrees = max_degrees;
        self
    }

    /// Replace the frame period.
    #[must_use]
    pub const fn with_frame_us(mut self, frame_us: u32) -> Self {
        self.frame_us = frame_us;
        self
    }

    /// Replace the end-of-frame guard: the boundary is scheduled only while it is more
    /// than `headroom_ticks` ahead, otherwise the next frame starts `late_delay_ticks`
    /// from now.
    ///
    /// The defaults are empirical; tune them to the interrupt latency of the target.
    #[must_use]
    pub const fn with_frame_guard(mut self, headroom_ticks: u32, late_delay_ticks: u32) -> Self {
        self.frame_headroom_ticks = headroom_ticks;
        self.late_frame_delay_ticks = late_delay_ticks;
        self
    }

    /// Convert microseconds to timer ticks, truncating.
    ///
    /// Saturates at `u32::MAX` for durations the timer could never measure.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "bounded by u32::MAX just above")]
    pub const fn us_to_ticks(&self, us: u32) -> u32 {
        let denominator = MICROS_PER_SECOND.saturating_mul(self.timer_prescaler as u64);
        let Some(ticks) = (us as u64)
            .saturating_mul(self.timer_frequency_hz as u64)
            .checked_div(denominator)
        else {
            return 0;
        };
        if ticks > u32::MAX as u64 {
            u32::MAX
        } else {
            ticks as u32
        }
    }

    /// Pulse width for `degrees`, interpolated linearly between the minimum and maximum
    /// pulse. Angles above the maximum clamp to it.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "offset never exceeds the u32 span")]
    pub const fn angle_to_us(&self, degrees: u16) -> u32 {
        let degrees = if degrees > self.max_degrees {
            self.max_degrees
        } else {
            degrees
        };
        let span = self.max_pulse_us.saturating_sub(self.min_pulse_us) as u64;
        let Some(offset) = span
            .saturating_mul(degrees as u64)
            .checked_div(self.max_degrees as u64)
        else {
            return self.min_pulse_us;
        };
        self.min_pulse_us.saturating_add(offset as u32)
    }

    /// Pulse width for `degrees` in timer ticks.
    #[must_use]
    pub const fn angle_to_ticks(&self, degrees: u16) -> u32 {
        self.us_to_ticks(self.angle_to_us(degrees))
    }

    /// Pulse width at 0° in timer ticks.
    #[must_use]
    pub const fn min_pulse_ticks(&self) -> u32 {
        self.us_to_ticks(self.min_pulse_us)
    }

    /// Pulse width at the maximum angle in timer ticks.
    #[must_use]
    pub const fn max_pulse_ticks(&self) -> u32 {
        self.us_to_ticks(self.max_pulse_us)
    }

    /// Frame period in timer ticks.
    #[must_use]
    pub const fn frame_ticks(&self) -> u32 {
        self.us_to_ticks(self.frame_us)
    }

    /// Check that this configuration can drive servos from a counter that wraps after
    /// `timer_max_ticks`.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: [`Error::ZeroTickRate`],
    /// [`Error::InvalidPulseRange`], [`Error::PulseExceedsFrame`],
    /// [`Error::ZeroMaxDegrees`], or [`Error::FrameExceedsTimer`].
    pub const fn validate(&self, timer_max_ticks: u32) -> Result<()> {
        if self.timer_frequency_hz == 0 || self.timer_prescaler == 0 {
            return Err(Error::ZeroTickRate);
        }
        if self.min_pulse_us >= self.max_pulse_us {
            return Err(Error::InvalidPulseRange {
                min_us: self.min_pulse_us,
                max_us: self.max_pulse_us,
            });
        }
        if self.max_pulse_us >= self.frame_us {
            return Err(Error::PulseExceedsFrame {
                max_pulse_us: self.max_pulse_us,
                frame_us: self.frame_us,
            });
        }
        if self.max_degrees == 0 {
            return Err(Error::ZeroMaxDegrees);
        }
        if self.min_pulse_ticks() == 0 {
            return Err(Error::ZeroTickRate);
        }
        let frame_ticks = self.frame_ticks();
        if frame_ticks > timer_max_ticks {
            return Err(Error::FrameExceedsTimer {
                frame_ticks,
                timer_max_ticks,
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate), then also check that `capacity` servos at their
    /// longest pulse, plus the end-of-frame guard, fit before the counter wraps.
    ///
    /// A counter that wraps mid-frame would make the frame boundary look far away and
    /// stretch that frame to almost two periods.
    ///
    /// # Errors
    ///
    /// Any error from [`validate`](Self::validate), or [`Error::PulsesExceedTimer`].
    pub const fn validate_for(&self, capacity: usize, timer_max_ticks: u32) -> Result<()> {
        if let Err(error) = self.validate(timer_max_ticks) {
            return Err(error);
        }
        let guard = if self.frame_headroom_ticks > self.late_frame_delay_ticks {
            self.frame_headroom_ticks
        } else {
            self.late_frame_delay_ticks
        };
        let worst_case_ticks = (capacity as u64)
            .saturating_mul(self.max_pulse_ticks() as u64)
            .saturating_add(guard as u64);
        if worst_case_ticks > timer_max_ticks as u64 {
            return Err(Error::PulsesExceedTimer {
                capacity,
                worst_case_ticks,
                timer_max_ticks,
            });
        }
        Ok(())
    }
}
