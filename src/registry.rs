//! Fixed-capacity, append-only table of servo channels.
//!
//! Slots are written once, under a critical section, before the count that makes them
//! visible is published. Afterwards only the pulse width changes, through a single
//! atomic store, so the compare-match handler can read a slot without locking.

use critical_section::CriticalSection;
use portable_atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

use crate::hal::{Pin, Port};

/// Handle returned by [`SoftServo::register`](crate::SoftServo::register).
///
/// The value is the servo's position in registration order. Handles for servos that
/// were never registered are accepted everywhere and ignored.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoId(u8);

impl ServoId {
    /// Handle for the servo registered `index`-th (zero-based).
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Registration-order index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<ServoId> for u8 {
    fn from(id: ServoId) -> Self {
        id.0
    }
}

/// Snapshot of one registered servo.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoChannel {
    /// Port of the signal pin.
    pub port: Port,
    /// Signal pin within `port`.
    pub pin: Pin,
    /// Current pulse width in timer ticks; zero means no pulse is emitted.
    pub pulse_ticks: u32,
}

struct Slot {
    // port in bits 3..5, pin in bits 0..3
    location: AtomicU8,
    pulse_ticks: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Self {
            location: AtomicU8::new(0),
            pulse_ticks: AtomicU32::new(0),
        }
    }

    fn port_pin(&self) -> (Port, Pin) {
        let bits = self.location.load(Ordering::Relaxed);
        (Port::from_bits(bits >> 3), Pin::from_bits(bits))
    }
}

const fn pack(port: Port, pin: Pin) -> u8 {
    ((port as u8) << 3) | pin as u8
}

pub(crate) struct Registry<const N: usize> {
    slots: [Slot; N],
    count: AtomicUsize,
}

impl<const N: usize> Registry<N> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [const { Slot::new() }; N],
            count: AtomicUsize::new(0),
        }
    }

    /// Number of published slots.
    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Append a channel with a zero pulse width, or `None` when full.
    ///
    /// The critical section makes this the only writer of `count`.
    pub(crate) fn push(&self, _cs: CriticalSection<'_>, port: Port, pin: Pin) -> Option<ServoId> {
        let index = self.count.load(Ordering::Relaxed);
        let slot = self.slots.get(index)?;
        let id = ServoId(u8::try_from(index).ok()?);
        slot.location.store(pack(port, pin), Ordering::Relaxed);
        slot.pulse_ticks.store(0, Ordering::Relaxed);
        self.count.store(index.saturating_add(1), Ordering::Release);
        Some(id)
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        if index < self.len() {
            self.slots.get(index)
        } else {
            None
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<ServoChannel> {
        self.slot(index).map(|slot| {
            let (port, pin) = slot.port_pin();
            ServoChannel {
                port,
                pin,
                pulse_ticks: slot.pulse_ticks.load(Ordering::Relaxed),
            }
        })
    }

    /// Store a new pulse width; returns `false` for an unpublished index.
    pub(crate) fn set_pulse_ticks(&self, index: usize, ticks: u32) -> bool {
        self.slot(index).is_some_and(|slot| {
            slot.pulse_ticks.store(ticks, Ordering::Relaxed);
            true
        })
    }

    /// Indices of every channel on `port`/`pin`, in registration order.
    pub(crate) fn matching(&self, port: Port, pin: Pin) -> impl Iterator<Item = usize> + '_ {
        let wanted = pack(port, pin);
        self.slots
            .iter()
            .take(self.len())
            .enumerate()
            .filter(move |(_, slot)| slot.location.load(Ordering::Relaxed) == wanted)
            .map(|(index, _)| index)
    }
}
