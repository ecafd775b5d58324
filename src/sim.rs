//! Host-side stand-ins for the timer and GPIO, for testing without hardware.
//!
//! [`SimTimer`] models a 16-bit free-running counter with one compare register.
//! [`SimGpio`] logs every level change together with the absolute simulated time.
//! [`Simulation`] fires compare matches in time order, the way the timer interrupt would,
//! so whole frames can be run and their pulses inspected.

use core::cell::Cell;

use heapless::Vec;

use crate::hal::{CompareHandler, CompareTimer, Gpio, Pin, PinState, Port};
use crate::{ServoConfig, SoftServo};

/// Number of level changes a [`SimGpio`] keeps before it starts dropping them.
pub const SIM_EDGE_CAPACITY: usize = 1_024;

/// Number of pulses returned by one pulse query.
pub const SIM_PULSE_CAPACITY: usize = SIM_EDGE_CAPACITY / 2;

/// A 16 MHz clock with prescaler 8: two ticks per microsecond and a 40 000-tick frame
/// that fits the 16-bit [`SimTimer`].
pub const SIM_CONFIG: ServoConfig = ServoConfig::new(16_000_000, 8);

/// A simulated 16-bit timer with one compare-match interrupt.
///
/// Time only moves when [`advance_to_match`](Self::advance_to_match) is called; the
/// handler therefore always observes the counter exactly at the compare value.
#[derive(Debug)]
pub struct SimTimer {
    counter: u32,
    compare: u32,
    elapsed: u64,
    resets: u32,
    handler: Option<CompareHandler>,
}

impl SimTimer {
    /// A stopped counter at zero with no handler installed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: 0,
            compare: 0,
            elapsed: 0,
            resets: 0,
            handler: None,
        }
    }

    /// Ticks since the simulation began; unlike the counter, never reset.
    #[must_use]
    pub const fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Current compare register value.
    #[must_use]
    pub const fn compare(&self) -> u32 {
        self.compare
    }

    /// How many times the counter was reset.
    #[must_use]
    pub const fn resets(&self) -> u32 {
        self.resets
    }

    /// Whether a compare-match handler is installed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.handler.is_some()
    }

    /// Ticks until the counter next equals the compare value, if armed.
    ///
    /// A compare value equal to the counter matches only after a full wrap.
    #[must_use]
    pub const fn ticks_until_match(&self) -> Option<u64> {
        if self.handler.is_none() {
            return None;
        }
        let delta = self.compare.wrapping_sub(self.counter) & Self::MAX_TICKS;
        if delta == 0 {
            Some((Self::MAX_TICKS as u64).saturating_add(1))
        } else {
            Some(delta as u64)
        }
    }

    /// Move time forward to the next compare match and return when it happened along
    /// with the handler to run for it.
    pub fn advance_to_match(&mut self) -> Option<(u64, CompareHandler)> {
        let handler = self.handler?;
        let delta = self.ticks_until_match()?;
        self.counter = self.compare;
        self.elapsed = self.elapsed.saturating_add(delta);
        Some((self.elapsed, handler))
    }
}

impl CompareTimer for SimTimer {
    const MAX_TICKS: u32 = 0xFFFF;

    fn now(&self) -> u32 {
        self.counter
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.resets = self.resets.wrapping_add(1);
    }

    fn set_compare(&mut self, tick: u32) {
        self.compare = tick & Self::MAX_TICKS;
    }

    fn set_compare_handler(&mut self, handler: CompareHandler) {
        self.handler = Some(handler);
    }
}

impl Default for SimTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded [`Gpio::set_level`] call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Edge {
    /// Simulated time of the call.
    pub at: u64,
    /// Port written.
    pub port: Port,
    /// Pin written.
    pub pin: Pin,
    /// Level written.
    pub level: PinState,
}

/// A completed HIGH-then-LOW pulse on one pin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pulse {
    /// Port of the pin.
    pub port: Port,
    /// Pin that pulsed.
    pub pin: Pin,
    /// Time of the rising edge.
    pub start: u64,
    /// Time of the falling edge.
    pub end: u64,
}

impl Pulse {
    /// Time spent HIGH.
    #[must_use]
    pub const fn width(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Simulated GPIO ports that remember pin directions, levels, and every write.
#[derive(Debug)]
pub struct SimGpio {
    now: u64,
    outputs: [u8; 4],
    high: [u8; 4],
    edges: Vec<Edge, SIM_EDGE_CAPACITY>,
    dropped: usize,
}

impl SimGpio {
    /// All pins inputs, all levels LOW, empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: 0,
            outputs: [0; 4],
            high: [0; 4],
            edges: Vec::new(),
            dropped: 0,
        }
    }

    /// Set the timestamp given to subsequent writes.
    pub const fn set_now(&mut self, at: u64) {
        self.now = at;
    }

    /// Whether the pin was made an output.
    #[must_use]
    pub fn is_output(&self, port: Port, pin: Pin) -> bool {
        Self::bit(&self.outputs, port, pin)
    }

    /// Last level written to the pin.
    #[must_use]
    pub fn level(&self, port: Port, pin: Pin) -> PinState {
        PinState::from(Self::bit(&self.high, port, pin))
    }

    /// Every write so far, oldest first.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Writes that did not fit in the log.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Forget the logged writes (levels and directions are kept).
    pub fn clear_edges(&mut self) {
        self.edges.clear();
        self.dropped = 0;
    }

    /// Completed pulses in the log, ordered by falling edge.
    ///
    /// A HIGH written to a pin that is already HIGH does not restart its pulse.
    #[must_use]
    pub fn pulses(&self) -> Vec<Pulse, SIM_PULSE_CAPACITY> {
        let mut rising = [[None::<u64>; 8]; 4];
        let mut pulses = Vec::new();
        for edge in &self.edges {
            let Some(start) = rising
                .get_mut(edge.port.index())
                .and_then(|row| row.get_mut(edge.pin.index()))
            else {
                continue;
            };
            match edge.level {
                PinState::High => {
                    if start.is_none() {
                        *start = Some(edge.at);
                    }
                }
                PinState::Low => {
                    if let Some(at) = start.take() {
                        let pulse = Pulse {
                            port: edge.port,
                            pin: edge.pin,
                            start: at,
                            end: edge.at,
                        };
                        if pulses.push(pulse).is_err() {
                            break;
                        }
                    }
                }
            }
        }
        pulses
    }

    fn bit(bits: &[u8; 4], port: Port, pin: Pin) -> bool {
        bits.get(port.index())
            .is_some_and(|byte| byte & (1 << pin.index()) != 0)
    }

    fn write_bit(bits: &mut [u8; 4], port: Port, pin: Pin, set: bool) {
        if let Some(byte) = bits.get_mut(port.index()) {
            let mask = 1 << pin.index();
            if set {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }
}

impl Gpio for SimGpio {
    fn set_output(&mut self, port: Port, pin: Pin) {
        Self::write_bit(&mut self.outputs, port, pin, true);
    }

    fn set_level(&mut self, port: Port, pin: Pin, level: PinState) {
        Self::write_bit(&mut self.high, port, pin, level == PinState::High);
        let edge = Edge {
            at: self.now,
            port,
            pin,
            level,
        };
        if self.edges.push(edge).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

/// Start and end of one frame, in simulated ticks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameSpan {
    /// Time the frame started (counter reset).
    pub start: u64,
    /// Time the following frame started.
    pub end: u64,
}

impl FrameSpan {
    /// Length of the frame.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether `at` falls inside the frame (start inclusive, end exclusive).
    #[must_use]
    pub const fn contains(&self, at: u64) -> bool {
        self.start <= at && at < self.end
    }
}

/// Drives a simulated [`SoftServo`] by firing its timer's compare matches in order.
pub struct Simulation<'a, const N: usize> {
    servo: &'a SoftServo<SimTimer, SimGpio, N>,
    frame_start: Cell<Option<u64>>,
}

impl<'a, const N: usize> Simulation<'a, N> {
    /// Simulate `servo`, which must have been built with a handler that calls its own
    /// [`on_compare_match`](SoftServo::on_compare_match).
    #[must_use]
    pub const fn new(servo: &'a SoftServo<SimTimer, SimGpio, N>) -> Self {
        Self {
            servo,
            frame_start: Cell::new(None),
        }
    }

    /// Simulated time now.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.servo.with_timer(|timer| timer.elapsed())
    }

    /// Fire the next compare match, returning its time, or `None` while no handler is
    /// installed (before the first registration).
    pub fn step(&self) -> Option<u64> {
        self.frame_start.set(None);
        self.fire()
    }

    /// Fire every compare match due at or before `at`; returns how many fired.
    pub fn run_until(&self, at: u64) -> usize {
        self.frame_start.set(None);
        let mut fired: usize = 0;
        loop {
            let due = self.servo.with_timer(|timer| {
                timer
                    .ticks_until_match()
                    .map(|delta| timer.elapsed().saturating_add(delta))
            });
            match due {
                Some(due) if due <= at => {
                    if self.fire().is_none() {
                        return fired;
                    }
                    fired = fired.saturating_add(1);
                }
                _ => return fired,
            }
        }
    }

    /// Run one complete frame and return its span.
    ///
    /// Consecutive calls return consecutive frames. Returns `None` if the timer is not
    /// armed or the frame never ends.
    pub fn run_frame(&self) -> Option<FrameSpan> {
        let start = match self.frame_start.take() {
            Some(start) => start,
            None => self.fire_until_frame_start()?,
        };
        let end = self.fire_until_frame_start()?;
        self.frame_start.set(Some(end));
        Some(FrameSpan { start, end })
    }

    /// Completed pulses whose rising edge lies inside `frame`.
    #[must_use]
    pub fn pulses_in(&self, frame: FrameSpan) -> Vec<Pulse, SIM_PULSE_CAPACITY> {
        self.servo.with_gpio(|gpio| {
            gpio.pulses()
                .into_iter()
                .filter(|pulse| frame.contains(pulse.start))
                .collect()
        })
    }

    fn fire(&self) -> Option<u64> {
        let (at, handler) = self.servo.with_timer(SimTimer::advance_to_match)?;
        self.servo.with_gpio(|gpio| gpio.set_now(at));
        handler();
        Some(at)
    }

    fn fire_until_frame_start(&self) -> Option<u64> {
        let before = self.servo.frames_started();
        // A frame takes one match per pulsing servo plus one for the boundary.
        let limit = N.saturating_mul(2).saturating_add(4);
        for _ in 0..limit {
            let at = self.fire()?;
            if self.servo.frames_started() != before {
                return Some(at);
            }
        }
        None
    }
}
