#![cfg(feature = "host")]
#![allow(missing_docs)]
//! Host-level tests for servo registration and angle commands.

use soft_servo::sim::{SIM_CONFIG, SimGpio, SimTimer};
use soft_servo::{Error, Pin, PinState, Port, ServoId, SoftServo, soft_servo};

soft_servo! {
    static FRESH: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static ARMING: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static FULL: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static ANGLES: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static BY_PIN: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static RELAXING: SoftServo<SimTimer, SimGpio> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

soft_servo! {
    static PAIR: SoftServo<SimTimer, SimGpio, 2> = (SIM_CONFIG, SimTimer::new(), SimGpio::new());
}

#[test]
fn registration_makes_pin_a_low_output() {
    let id = FRESH.register(Port::B, Pin::P3).expect("slot available");

    assert_eq!(id, ServoId::new(0));
    assert_eq!(FRESH.servo_count(), 1);
    FRESH.with_gpio(|gpio| {
        assert!(gpio.is_output(Port::B, Pin::P3));
        assert_eq!(gpio.level(Port::B, Pin::P3), PinState::Low);
        let edge = gpio.edges().first().copied().expect("pin written");
        assert_eq!((edge.port, edge.pin, edge.level), (Port::B, Pin::P3, PinState::Low));
    });

    let channel = FRESH.channel(id).expect("registered");
    assert_eq!(channel.port, Port::B);
    assert_eq!(channel.pin, Pin::P3);
    assert_eq!(channel.pulse_ticks, 0);
}

#[test]
fn first_registration_arms_timer_once() {
    assert!(!ARMING.with_timer(|timer| timer.is_armed()));

    ARMING.register(Port::A, Pin::P0).expect("slot available");
    let (armed, resets, compare) =
        ARMING.with_timer(|timer| (timer.is_armed(), timer.resets(), timer.compare()));
    assert!(armed);
    assert_eq!(resets, 1);
    assert_eq!(compare, SIM_CONFIG.late_frame_delay_ticks);

    ARMING.register(Port::A, Pin::P1).expect("slot available");
    assert_eq!(ARMING.with_timer(|timer| timer.resets()), 1);
}

#[test]
fn tenth_registration_is_refused() {
    assert_eq!(FULL.capacity(), 9);
    for (index, pin) in Pin::ALL.into_iter().enumerate() {
        let id = FULL.register(Port::C, pin).expect("slot available");
        assert_eq!(id.index(), index);
    }
    let ninth = FULL.register(Port::D, Pin::P0).expect("slot available");
    assert_eq!(ninth.index(), 8);

    assert_eq!(
        FULL.register(Port::D, Pin::P1),
        Err(Error::CapacityExceeded { capacity: 9 })
    );
    assert_eq!(FULL.servo_count(), 9);
    assert!(FULL.channel(ServoId::new(9)).is_none());
    assert!(!FULL.with_gpio(|gpio| gpio.is_output(Port::D, Pin::P1)));
}

#[test]
fn capacity_follows_const_parameter() {
    assert_eq!(PAIR.capacity(), 2);
    PAIR.register(Port::A, Pin::P0).expect("slot available");
    PAIR.register(Port::A, Pin::P1).expect("slot available");
    assert_eq!(
        PAIR.register(Port::A, Pin::P2),
        Err(Error::CapacityExceeded { capacity: 2 })
    );
}

#[test]
fn set_angle_by_id_stores_ticks() {
    let id = ANGLES.register(Port::D, Pin::P6).expect("slot available");

    assert!(ANGLES.set_angle_by_id(id, 90));
    assert_eq!(
        ANGLES.channel(id).map(|channel| channel.pulse_ticks),
        Some(SIM_CONFIG.angle_to_ticks(90))
    );

    assert!(ANGLES.set_angle_by_id(id, 0));
    assert_eq!(
        ANGLES.channel(id).map(|channel| channel.pulse_ticks),
        Some(SIM_CONFIG.min_pulse_ticks())
    );

    assert!(ANGLES.set_angle_by_id(id, 180));
    assert_eq!(
        ANGLES.channel(id).map(|channel| channel.pulse_ticks),
        Some(SIM_CONFIG.max_pulse_ticks())
    );
}

#[test]
fn out_of_range_commands_are_ignored() {
    let id = ANGLES.register(Port::D, Pin::P7).expect("slot available");
    assert!(ANGLES.set_angle_by_id(id, 45));

    assert!(!ANGLES.set_angle_by_id(id, 181));
    assert_eq!(
        ANGLES.channel(id).map(|channel| channel.pulse_ticks),
        Some(SIM_CONFIG.angle_to_ticks(45))
    );

    let unknown = ServoId::new(8);
    assert!(!ANGLES.set_angle_by_id(unknown, 90));
    assert!(ANGLES.channel(unknown).is_none());
}

#[test]
fn set_angle_by_pin_updates_every_match() {
    let first = BY_PIN.register(Port::B, Pin::P1).expect("slot available");
    let other = BY_PIN.register(Port::B, Pin::P2).expect("slot available");
    let duplicate = BY_PIN.register(Port::B, Pin::P1).expect("slot available");

    assert_eq!(BY_PIN.set_angle_by_pin(Port::B, Pin::P1, 120), 2);
    let expected = Some(SIM_CONFIG.angle_to_ticks(120));
    assert_eq!(BY_PIN.channel(first).map(|c| c.pulse_ticks), expected);
    assert_eq!(BY_PIN.channel(duplicate).map(|c| c.pulse_ticks), expected);
    assert_eq!(BY_PIN.channel(other).map(|c| c.pulse_ticks), Some(0));

    assert_eq!(BY_PIN.set_angle_by_pin(Port::A, Pin::P1, 120), 0);
    assert_eq!(BY_PIN.set_angle_by_pin(Port::B, Pin::P2, 200), 0);
    assert_eq!(BY_PIN.channel(other).map(|c| c.pulse_ticks), Some(0));
}

#[test]
fn center_and_relax() {
    let id = RELAXING.register(Port::C, Pin::P4).expect("slot available");
    let twin = RELAXING.register(Port::C, Pin::P5).expect("slot available");

    assert!(RELAXING.center(id));
    assert_eq!(
        RELAXING.channel(id).map(|c| c.pulse_ticks),
        Some(SIM_CONFIG.angle_to_ticks(90))
    );

    assert!(RELAXING.relax(id));
    assert_eq!(RELAXING.channel(id).map(|c| c.pulse_ticks), Some(0));
    assert!(!RELAXING.relax(ServoId::new(5)));

    assert!(RELAXING.set_angle_by_id(twin, 30));
    assert_eq!(RELAXING.relax_by_pin(Port::C, Pin::P5), 1);
    assert_eq!(RELAXING.channel(twin).map(|c| c.pulse_ticks), Some(0));
}
