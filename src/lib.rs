//! # Smart snooze alarm clock
//! Control core of the alarm clock: everything that decides what the device should be doing right
//! now and when the alarm fires next. Hardware lives in the firmware binary, this library only sees
//! button levels, wall clock timestamps and the persisted settings record, so it runs and is tested
//! on the host as well.
//!
//! The parts, leaves first:
//! - [`clock`]: wall clock timestamps and the readiness gate that holds back scheduling until time
//!   is synced
//! - [`input`]: button levels and the edge detecting input sampler
//! - [`alarm`]: the alarm configuration, the next trigger computation and the lead time learning
//! - [`state`]: the device state machine driven by button edges and the scheduler
//! - [`buzzer`]: the buzzer actuation policy
//! - [`controller`]: the single owned context tying the above together for the control loop
//!
//! Around them, [`settings`] encodes the persisted record, [`telemetry`] the cloud messages and
//! [`render`] what the display shows. [`shutdown`] holds the flag that stops the control loop.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod alarm;
pub mod buzzer;
pub mod clock;
pub mod controller;
pub mod input;
pub mod render;
pub mod settings;
pub mod shutdown;
pub mod state;
pub mod telemetry;
