use derive_more::{Display, Error};

/// Errors reported by this crate.
///
/// Angle commands never fail: an out-of-range angle or an unknown [`ServoId`](crate::ServoId)
/// is ignored. Only registration and configuration report errors.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every servo slot is taken; the registry was left unchanged.
    #[display("all {capacity} servo slots are in use")]
    CapacityExceeded {
        /// Number of slots the driver was built with.
        capacity: usize,
    },

    /// The timer frequency, prescaler, or resulting minimum pulse is zero ticks.
    #[display("timer tick rate is too low to express a servo pulse")]
    ZeroTickRate,

    /// The minimum pulse width is not below the maximum pulse width.
    #[display("pulse range {min_us}..{max_us} µs is empty")]
    InvalidPulseRange {
        /// Pulse width at 0°.
        min_us: u32,
        /// Pulse width at the maximum angle.
        max_us: u32,
    },

    /// The longest pulse does not fit inside one frame.
    #[display("{max_pulse_us} µs pulse does not fit a {frame_us} µs frame")]
    PulseExceedsFrame {
        /// Pulse width at the maximum angle.
        max_pulse_us: u32,
        /// Frame period.
        frame_us: u32,
    },

    /// The maximum angle is zero degrees.
    #[display("maximum angle must be at least one degree")]
    ZeroMaxDegrees,

    /// With every slot at its longest pulse, the counter would wrap before the frame ends;
    /// raise the prescaler or lower the capacity.
    #[display("{capacity} full-scale pulses need {worst_case_ticks} ticks, timer top is {timer_max_ticks}")]
    PulsesExceedTimer {
        /// Number of slots the driver was built with.
        capacity: usize,
        /// Ticks of `capacity` longest pulses plus the end-of-frame guard.
        worst_case_ticks: u64,
        /// Highest value of the free-running counter.
        timer_max_ticks: u32,
    },

    /// A frame is longer than the timer counter can measure; raise the prescaler.
    #[display("frame of {frame_ticks} ticks exceeds timer top {timer_max_ticks}")]
    FrameExceedsTimer {
        /// Frame period in timer ticks.
        frame_ticks: u32,
        /// Highest value of the free-running counter.
        timer_max_ticks: u32,
    },
}

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
