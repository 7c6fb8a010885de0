//! This crate contains architecture-agnostic logic for a zimbelstern, the bell-and-star ornament mounted on a pipe
//! organ. The device is activated from its own pistons or by messages the organ sends over its
//! [MIDI](https://midi.org/midi-1-0) bus, strikes a set of tuned bells with solenoids, and spins a star with a stepper
//! motor.
//!
//! Everything here is free of hardware: the firmware crate samples pins and serial ports, hands the raw data to a
//! [`Controller`](controller::Controller), and turns the resulting [`Change`](state::Change)s and [`Strike`](bell::Strike)s
//! back into electrical signals.

#![deny(missing_docs)]
#![no_std]

// must stay first so that the logging macros are visible to every module below
#[macro_use]
mod fmt;

pub mod bell;
pub mod configuration;
pub mod controller;
/// Numeric ramps shared by the bell fade-in and the star motor.
pub mod curve;
pub mod input;
pub mod midi;
pub mod mode;
pub mod motor;
pub mod persistence;
pub mod state;
pub mod trigger;
