#![cfg(feature = "host")]
#![allow(missing_docs)]
//! Host-level tests for driving servos through `embedded-hal` output pins.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use soft_servo::hal::{Gpio, OutputPinBank, Pin, PinState, Port};
use soft_servo::sim::{SIM_CONFIG, SimTimer};
use soft_servo::{SoftServo, soft_servo};

/// An output pin that remembers its level and how often it was written.
#[derive(Debug, Default)]
struct Probe {
    high: bool,
    writes: usize,
}

impl ErrorType for Probe {
    type Error = Infallible;
}

impl OutputPin for Probe {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }
}

soft_servo! {
    static BANKED: SoftServo<SimTimer, OutputPinBank<Probe>> =
        (SIM_CONFIG, SimTimer::new(), OutputPinBank::new());
}

fn level(bank: &OutputPinBank<Probe>, port: Port, pin: Pin) -> Option<bool> {
    bank.get(port, pin).map(|probe| probe.high)
}

#[test]
fn set_level_drives_inserted_pin() {
    let mut bank = OutputPinBank::new();
    assert!(bank.insert(Port::B, Pin::P2, Probe::default()).is_none());

    bank.set_output(Port::B, Pin::P2);
    bank.set_level(Port::B, Pin::P2, PinState::High);
    assert_eq!(level(&bank, Port::B, Pin::P2), Some(true));

    bank.set_level(Port::B, Pin::P2, PinState::Low);
    assert_eq!(level(&bank, Port::B, Pin::P2), Some(false));
    assert_eq!(bank.get(Port::B, Pin::P2).map(|probe| probe.writes), Some(2));
}

#[test]
fn unmapped_pins_are_skipped() {
    let mut bank = OutputPinBank::new();
    bank.insert(Port::A, Pin::P0, Probe::default());

    bank.set_level(Port::A, Pin::P1, PinState::High);
    bank.set_level(Port::D, Pin::P0, PinState::High);

    assert!(bank.get(Port::A, Pin::P1).is_none());
    assert_eq!(bank.get(Port::A, Pin::P0).map(|probe| probe.writes), Some(0));
}

#[test]
fn insert_replaces_and_remove_returns_pin() {
    let mut bank = OutputPinBank::new();
    bank.insert(Port::C, Pin::P7, Probe::default());
    bank.set_level(Port::C, Pin::P7, PinState::High);

    let previous = bank
        .insert(Port::C, Pin::P7, Probe::default())
        .expect("pin was present");
    assert!(previous.high);
    assert_eq!(level(&bank, Port::C, Pin::P7), Some(false));

    let removed = bank.remove(Port::C, Pin::P7).expect("pin was present");
    assert_eq!(removed.writes, 0);
    assert!(bank.remove(Port::C, Pin::P7).is_none());
    assert!(bank.get(Port::C, Pin::P7).is_none());
}

#[test]
fn servo_driver_pulses_bank_pins() {
    BANKED.with_gpio(|bank| {
        bank.insert(Port::D, Pin::P4, Probe::default());
        bank.insert(Port::D, Pin::P5, Probe::default());
    });
    let pan = BANKED.register(Port::D, Pin::P4).expect("slot available");
    let tilt = BANKED.register(Port::D, Pin::P5).expect("slot available");
    BANKED.set_angle_by_id(pan, 0);
    BANKED.set_angle_by_id(tilt, 180);

    let fire = || {
        let (_, handler) = BANKED
            .with_timer(SimTimer::advance_to_match)
            .expect("timer armed");
        handler();
        BANKED.with_gpio(|bank| (level(bank, Port::D, Pin::P4), level(bank, Port::D, Pin::P5)))
    };

    // Frame start raises the first servo, its falling edge raises the second.
    assert_eq!(fire(), (Some(true), Some(false)));
    assert_eq!(
        BANKED.with_timer(|timer| timer.compare()),
        SIM_CONFIG.angle_to_ticks(0)
    );
    assert_eq!(fire(), (Some(false), Some(true)));
    assert_eq!(
        BANKED.with_timer(|timer| timer.compare()),
        SIM_CONFIG
            .angle_to_ticks(0)
            .saturating_add(SIM_CONFIG.angle_to_ticks(180))
    );

    // Then everything is LOW until the frame boundary.
    assert_eq!(fire(), (Some(false), Some(false)));
    assert_eq!(
        BANKED.with_timer(|timer| timer.compare()),
        SIM_CONFIG.frame_ticks()
    );
    assert_eq!(BANKED.frames_started(), 1);
}
