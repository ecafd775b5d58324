//! A device abstraction that drives many hobby servos from one compare-match timer.
//!
//! See [`SoftServo`] for usage examples.
//!
//! # How the pulses are produced
//!
//! Each 20 ms frame, the compare-match handler walks the registered servos in order.
//! For each servo with a nonzero pulse width it drives the pin HIGH and schedules the
//! next compare match `pulse_ticks` later; that match drives the pin LOW and starts the
//! next servo. After the last servo, the next match is scheduled at the frame boundary,
//! where the counter is reset and the walk starts over. Pulses therefore never overlap,
//! and the whole frame lasts exactly one frame period as long as the pulses fit in it.
//! When they do not, the next frame starts a few ticks after the last pulse. Either way
//! the counter never wraps inside a frame: [`SoftServo::new`] rejects capacities whose
//! longest pulses would not fit the timer.
//!
//! A compare match that is missed (for example because interrupts were disabled for
//! longer than a pulse) is neither detected nor compensated.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::config::{SERVO_MAX_NUM, ServoConfig};
use crate::hal::{CompareHandler, CompareTimer, Gpio, Pin, PinState, Port};
use crate::registry::{Registry, ServoChannel, ServoId};
use crate::{Error, Result};

/// Define a `static` [`SoftServo`] together with the compare-match handler it installs.
///
/// The generated handler is a private function that forwards to
/// [`SoftServo::on_compare_match`]; the platform's timer interrupt should end up calling
/// it through [`CompareTimer::set_compare_handler`].
///
/// See [`SoftServo`] for an example.
#[macro_export]
macro_rules! soft_servo {
    (
        $(#[$meta:meta])*
        $vis:vis static $name:ident: $ty:ty = ($config:expr, $timer:expr, $gpio:expr $(,)?);
    ) => {
        $(#[$meta])*
        $vis static $name: $ty = <$ty>::new($config, $timer, $gpio, {
            fn on_compare_match() {
                $name.on_compare_match();
            }
            on_compare_match
        });
    };
}

struct Hardware<T, G> {
    timer: T,
    gpio: G,
}

/// Scheduler position, owned by the compare-match handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    /// No pulse in flight; the next match starts a frame.
    FrameEnd,
    /// The servo at this index is HIGH; the next match ends its pulse.
    Active(usize),
}

/// A device abstraction for up to `N` hobby servos on arbitrary GPIO pins, all timed by
/// one compare-match timer.
///
/// Each servo is [registered](Self::register) on a port/pin and commanded by angle. The
/// pulses themselves are generated entirely by [`on_compare_match`](Self::on_compare_match),
/// which the timer interrupt calls; application code never has to poll.
///
/// Angle commands take effect at the servo's next pulse. A command that lands while the
/// servo's pulse for the current frame is already running applies from the next frame,
/// at most one frame period later.
///
/// # Example
///
/// ```rust
/// use soft_servo::sim::{SimGpio, SimTimer, Simulation};
/// use soft_servo::{Pin, Port, ServoConfig, SoftServo, soft_servo};
///
/// // 16 MHz clock, prescaler 8: 2 ticks/µs, 40_000 ticks per 20 ms frame.
/// const CONFIG: ServoConfig = ServoConfig::new(16_000_000, 8);
///
/// soft_servo! {
///     static SERVOS: SoftServo<SimTimer, SimGpio> = (CONFIG, SimTimer::new(), SimGpio::new());
/// }
///
/// # fn main() -> soft_servo::Result<()> {
/// let pan = SERVOS.register(Port::D, Pin::P4)?;
/// let tilt = SERVOS.register(Port::D, Pin::P5)?;
/// SERVOS.set_angle_by_id(pan, 0);
/// SERVOS.set_angle_by_id(tilt, 180);
///
/// // On hardware the timer interrupt drives the handler; here the simulation does.
/// let simulation = Simulation::new(&SERVOS);
/// let frame = simulation.run_frame().expect("timer armed by first registration");
/// assert_eq!(frame.duration(), u64::from(CONFIG.frame_ticks()));
/// # Ok(())
/// # }
/// ```
pub struct SoftServo<T, G, const N: usize = SERVO_MAX_NUM> {
    config: ServoConfig,
    registry: Registry<N>,
    hardware: Mutex<RefCell<Hardware<T, G>>>,
    cursor: Mutex<Cell<Cursor>>,
    frames_started: AtomicU32,
    handler: CompareHandler,
}

impl<T, G, const N: usize> SoftServo<T, G, N>
where
    T: CompareTimer,
    G: Gpio,
{
    /// Build a driver that owns `timer` and `gpio`.
    ///
    /// `handler` must call [`on_compare_match`](Self::on_compare_match) on this driver; it
    /// is installed on the timer by the first successful [`register`](Self::register).
    /// The [`soft_servo!`](crate::soft_servo) macro writes the handler for you.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`ServoConfig::validate_for`] with `N` slots against
    /// `T::MAX_TICKS`, or if `N` is zero or above 255. In a `static` these are
    /// compile-time errors.
    #[must_use]
    pub const fn new(config: ServoConfig, timer: T, gpio: G, handler: CompareHandler) -> Self {
        assert!(N > 0, "a servo driver needs at least one slot");
        assert!(N <= u8::MAX as usize, "servo ids are limited to 255 slots");
        if config.validate_for(N, T::MAX_TICKS).is_err() {
            panic!("invalid servo configuration; see ServoConfig::validate_for");
        }
        Self {
            config,
            registry: Registry::new(),
            hardware: Mutex::new(RefCell::new(Hardware { timer, gpio })),
            cursor: Mutex::new(Cell::new(Cursor::FrameEnd)),
            frames_started: AtomicU32::new(0),
            handler,
        }
    }

    /// Add a servo on `port`/`pin` and return its id.
    ///
    /// The pin becomes an output and is driven LOW immediately; it stays LOW until the
    /// servo receives an angle. The first successful call also installs the
    /// compare-match handler and restarts the timer, so pulses begin shortly after.
    ///
    /// Registering one pin twice yields two ids that both drive the same output; avoid it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] when all `N` slots are used. Nothing changes
    /// in that case.
    pub fn register(&self, port: Port, pin: Pin) -> Result<ServoId> {
        critical_section::with(|cs| {
            if self.registry.len() >= N {
                warn!("SoftServo::register: all {} slots in use", N);
                return Err(Error::CapacityExceeded { capacity: N });
            }

            let mut hardware = self.hardware.borrow_ref_mut(cs);
            hardware.gpio.set_output(port, pin);
            hardware.gpio.set_level(port, pin, PinState::Low);

            let id = self
                .registry
                .push(cs, port, pin)
                .ok_or(Error::CapacityExceeded { capacity: N })?;

            if id.index() == 0 {
                hardware.timer.set_compare_handler(self.handler);
                hardware.timer.reset();
                hardware
                    .timer
                    .set_compare(self.config.late_frame_delay_ticks);
                info!(
                    "SoftServo: timer armed, frame = {} ticks",
                    self.config.frame_ticks()
                );
            }

            info!("SoftServo::register: {} on {}{}", id, port, pin);
            Ok(id)
        })
    }

    /// Move a servo to `degrees`, from 0 to the configured maximum (180 by default).
    ///
    /// Returns whether the command was applied. An angle above the maximum or an id that
    /// was never registered is ignored.
    pub fn set_angle_by_id(&self, id: ServoId, degrees: u16) -> bool {
        if degrees > self.config.max_degrees {
            debug!("SoftServo::set_angle_by_id: {} deg out of range", degrees);
            return false;
        }
        let ticks = self.config.angle_to_ticks(degrees);
        let applied = self.registry.set_pulse_ticks(id.index(), ticks);
        if applied {
            debug!("SoftServo: {} -> {} deg ({} ticks)", id, degrees, ticks);
        } else {
            debug!("SoftServo::set_angle_by_id: unknown {}", id);
        }
        applied
    }

    /// Move every servo registered on `port`/`pin` to `degrees`.
    ///
    /// Returns how many servos were updated: zero for an unknown pin or an out-of-range
    /// angle.
    pub fn set_angle_by_pin(&self, port: Port, pin: Pin, degrees: u16) -> usize {
        self.registry
            .matching(port, pin)
            .filter(|&index| {
                u8::try_from(index)
                    .is_ok_and(|index| self.set_angle_by_id(ServoId::new(index), degrees))
            })
            .count()
    }

    /// Move a servo to the middle of its range.
    pub fn center(&self, id: ServoId) -> bool {
        self.set_angle_by_id(id, self.config.max_degrees / 2)
    }

    /// Stop pulsing a servo so it can move freely. Its pin stays LOW from the next
    /// frame on; any later angle command resumes pulses.
    pub fn relax(&self, id: ServoId) -> bool {
        let applied = self.registry.set_pulse_ticks(id.index(), 0);
        if applied {
            debug!("SoftServo: {} relaxed", id);
        }
        applied
    }

    /// Relax every servo registered on `port`/`pin`, returning how many were relaxed.
    pub fn relax_by_pin(&self, port: Port, pin: Pin) -> usize {
        self.registry
            .matching(port, pin)
            .filter(|&index| self.registry.set_pulse_ticks(index, 0))
            .count()
    }

    /// Current state of a registered servo.
    #[must_use]
    pub fn channel(&self, id: ServoId) -> Option<ServoChannel> {
        self.registry.get(id.index())
    }

    /// Number of registered servos.
    #[must_use]
    pub fn servo_count(&self) -> usize {
        self.registry.len()
    }

    /// Maximum number of servos.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The configuration this driver was built with.
    #[must_use]
    pub const fn config(&self) -> &ServoConfig {
        &self.config
    }

    /// How many frames the handler has started since power-on (wrapping).
    #[must_use]
    pub fn frames_started(&self) -> u32 {
        self.frames_started.load(Ordering::Relaxed)
    }

    /// Run `f` with exclusive access to the timer, inside a critical section.
    pub fn with_timer<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.hardware.borrow_ref_mut(cs).timer))
    }

    /// Run `f` with exclusive access to the GPIO, inside a critical section.
    pub fn with_gpio<R>(&self, f: impl FnOnce(&mut G) -> R) -> R {
        critical_section::with(|cs| f(&mut self.hardware.borrow_ref_mut(cs).gpio))
    }

    /// Produce the next pulse edge. Call this, and only this, from the timer's
    /// compare-match interrupt.
    ///
    /// Ends the pulse in flight (or starts a new frame when none is), then raises the
    /// next servo with a nonzero pulse width and schedules its falling edge. Servos
    /// with a zero pulse width are skipped within the same call. Once every servo has
    /// been served, the next match is set to the frame boundary, or to a short delay
    /// when the boundary is too close to catch.
    pub fn on_compare_match(&self) {
        critical_section::with(|cs| {
            let mut hardware = self.hardware.borrow_ref_mut(cs);
            let Hardware { timer, gpio } = &mut *hardware;
            let cursor = self.cursor.borrow(cs);

            let mut next = match cursor.get() {
                Cursor::Active(index) => {
                    if let Some(channel) = self.registry.get(index) {
                        gpio.set_level(channel.port, channel.pin, PinState::Low);
                    }
                    index.saturating_add(1)
                }
                Cursor::FrameEnd => {
                    timer.reset();
                    self.frames_started.fetch_add(1, Ordering::Relaxed);
                    0
                }
            };

            while let Some(channel) = self.registry.get(next) {
                if channel.pulse_ticks > 0 {
                    timer.set_compare(timer.now().wrapping_add(channel.pulse_ticks));
                    gpio.set_level(channel.port, channel.pin, PinState::High);
                    cursor.set(Cursor::Active(next));
                    trace!("SoftServo: pulse {} for {} ticks", next, channel.pulse_ticks);
                    return;
                }
                next = next.saturating_add(1);
            }

            cursor.set(Cursor::FrameEnd);
            let now = timer.now();
            let frame_ticks = self.config.frame_ticks();
            if now.saturating_add(self.config.frame_headroom_ticks) < frame_ticks {
                timer.set_compare(frame_ticks);
            } else {
                trace!("SoftServo: frame overran at {} ticks", now);
                timer.set_compare(now.wrapping_add(self.config.late_frame_delay_ticks));
            }
        });
    }
}
