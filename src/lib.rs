//! Software PWM for hobby servos: up to nine servos on any GPIO pins, timed by a single
//! compare-match timer.
//!
//! Start with [`SoftServo`] and the [`soft_servo!`] macro. Implement [`CompareTimer`] and
//! [`Gpio`] for your target (or use [`OutputPinBank`] over `embedded-hal` pins), then
//! call [`SoftServo::on_compare_match`] from the timer interrupt.
//!
//! # Glossary
//!
//! - **Channel:** one registered servo's port, pin, and pulse width.
//! - **Frame:** one PWM period (20 ms by default) in which every channel gets at most one
//!   pulse.
//! - **Tick:** the smallest time step of the timer, set by its clock and prescaler.
//! - **Compare match:** the interrupt a timer raises when its free-running counter
//!   reaches a programmed value; used here to place every pulse edge.
//!
//! # Features
//!
//! - `host` (default): the [`sim`] module and a `std` critical-section implementation,
//!   for running on a development machine. Disable default features for firmware.
//! - `defmt`: log through `defmt`.
#![no_std]

#[macro_use]
mod fmt;

pub mod config;
mod error;
pub mod hal;
mod registry;
mod servo;
#[cfg(feature = "host")]
pub mod sim;

pub use crate::config::{SERVO_MAX_NUM, ServoConfig};
pub use crate::error::{Error, Result};
pub use crate::hal::{CompareTimer, Gpio, OutputPinBank, Pin, PinState, Port};
pub use crate::registry::{ServoChannel, ServoId};
pub use crate::servo::SoftServo;
