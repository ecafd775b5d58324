//! The two peripherals the servo driver needs: a compare-match timer and GPIO outputs.
//!
//! Implement [`CompareTimer`] and [`Gpio`] for the target's timer and port registers, or
//! wrap `embedded-hal` pins in an [`OutputPinBank`].

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

/// Digital output level, shared with `embedded-hal`.
#[doc(inline)]
pub use embedded_hal::digital::PinState;

/// Function the platform's compare-match interrupt vector calls.
///
/// For a servo driver in a `static`, this is a plain function that forwards to
/// [`SoftServo::on_compare_match`](crate::SoftServo::on_compare_match).
pub type CompareHandler = fn();

/// A free-running tick counter with one compare-match interrupt.
pub trait CompareTimer {
    /// Highest value the counter reaches before wrapping to zero.
    const MAX_TICKS: u32;

    /// Current counter value.
    fn now(&self) -> u32;

    /// Restart the counter from zero.
    fn reset(&mut self);

    /// Fire the compare-match interrupt when the counter next equals `tick`.
    ///
    /// Values above [`MAX_TICKS`](Self::MAX_TICKS) wrap the way the hardware register
    /// truncates them.
    fn set_compare(&mut self, tick: u32);

    /// Route compare-match interrupts to `handler` and enable them.
    fn set_compare_handler(&mut self, handler: CompareHandler);
}

/// GPIO port identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    /// Port A.
    A = 0,
    /// Port B.
    B = 1,
    /// Port C.
    C = 2,
    /// Port D.
    D = 3,
}

impl Port {
    /// Every port, in index order.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Zero-based index of this port.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => Self::D,
        }
    }
}

/// Pin number within a [`Port`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pin {
    /// Pin 0.
    P0 = 0,
    /// Pin 1.
    P1 = 1,
    /// Pin 2.
    P2 = 2,
    /// Pin 3.
    P3 = 3,
    /// Pin 4.
    P4 = 4,
    /// Pin 5.
    P5 = 5,
    /// Pin 6.
    P6 = 6,
    /// Pin 7.
    P7 = 7,
}

impl Pin {
    /// Every pin, in index order.
    pub const ALL: [Self; 8] = [
        Self::P0,
        Self::P1,
        Self::P2,
        Self::P3,
        Self::P4,
        Self::P5,
        Self::P6,
        Self::P7,
    ];

    /// Zero-based index of this pin.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::P0,
            1 => Self::P1,
            2 => Self::P2,
            3 => Self::P3,
            4 => Self::P4,
            5 => Self::P5,
            6 => Self::P6,
            _ => Self::P7,
        }
    }
}

/// Digital outputs addressed by port and pin.
///
/// Both calls are expected to complete synchronously and cannot fail at this layer.
pub trait Gpio {
    /// Make the pin a push-pull output.
    fn set_output(&mut self, port: Port, pin: Pin);

    /// Drive the pin.
    fn set_level(&mut self, port: Port, pin: Pin, level: PinState);
}

/// [`Gpio`] over individually owned `embedded-hal` output pins.
///
/// Pins that were never [inserted](Self::insert) are silently skipped.
///
/// ```rust
/// use core::convert::Infallible;
/// use embedded_hal::digital::{ErrorType, OutputPin};
/// use soft_servo::hal::{Gpio, OutputPinBank, Pin, PinState, Port};
///
/// #[derive(Default)]
/// struct Probe(bool);
///
/// impl ErrorType for Probe {
///     type Error = Infallible;
/// }
///
/// impl OutputPin for Probe {
///     fn set_low(&mut self) -> Result<(), Infallible> {
///         self.0 = false;
///         Ok(())
///     }
///     fn set_high(&mut self) -> Result<(), Infallible> {
///         self.0 = true;
///         Ok(())
///     }
/// }
///
/// let mut bank = OutputPinBank::new();
/// bank.insert(Port::D, Pin::P5, Probe::default());
/// bank.set_level(Port::D, Pin::P5, PinState::High);
/// assert!(bank.get(Port::D, Pin::P5).is_some_and(|probe| probe.0));
/// ```
pub struct OutputPinBank<P> {
    pins: [[Option<P>; 8]; 4],
}

impl<P> OutputPinBank<P> {
    /// An empty bank.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pins: [const { [const { None }; 8] }; 4],
        }
    }

    /// Place `output` at `port`/`pin`, returning the pin previously there.
    pub fn insert(&mut self, port: Port, pin: Pin, output: P) -> Option<P> {
        self.slot_mut(port, pin).replace(output)
    }

    /// Take the pin at `port`/`pin` back out of the bank.
    pub fn remove(&mut self, port: Port, pin: Pin) -> Option<P> {
        self.slot_mut(port, pin).take()
    }

    /// The pin at `port`/`pin`, if any.
    #[must_use]
    pub fn get(&self, port: Port, pin: Pin) -> Option<&P> {
        self.pins
            .get(port.index())
            .and_then(|row| row.get(pin.index()))
            .and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, port: Port, pin: Pin) -> &mut Option<P> {
        let [a, b, c, d] = &mut self.pins;
        let row = match port {
            Port::A => a,
            Port::B => b,
            Port::C => c,
            Port::D => d,
        };
        let [p0, p1, p2, p3, p4, p5, p6, p7] = row;
        match pin {
            Pin::P0 => p0,
            Pin::P1 => p1,
            Pin::P2 => p2,
            Pin::P3 => p3,
            Pin::P4 => p4,
            Pin::P5 => p5,
            Pin::P6 => p6,
            Pin::P7 => p7,
        }
    }
}

impl<P> Default for OutputPinBank<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Gpio for OutputPinBank<P>
where
    P: OutputPin<Error = Infallible>,
{
    fn set_output(&mut self, _port: Port, _pin: Pin) {
        // An `OutputPin` is already configured as an output.
    }

    fn set_level(&mut self, port: Port, pin: Pin, level: PinState) {
        if let Some(output) = self.slot_mut(port, pin) {
            let Ok(()) = output.set_state(level);
        }
    }
}
