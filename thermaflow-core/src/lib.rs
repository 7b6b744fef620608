//! Board-agnostic core logic for the oven controller firmware
//!
//! This crate contains all control logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (thermocouple, outputs, settings store)
//! - Persisted configuration, its byte encodings and control tuning
//! - Thermocouple filtering and fault confirmation
//! - Output channels and the slotted duty-cycle actuator
//! - Reflow and bake profiles and the phase state machine
//! - Duty-cycle learning
//! - Safety monitoring
//! - The per-tick controller that ties it together

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module.
mod fmt;

pub mod config;
pub mod controller;
pub mod learning;
pub mod output;
pub mod profile;
pub mod safety;
pub mod sensor;
pub mod state;
pub mod traits;

pub use controller::{OvenController, OvenStatus, RunOutcome};
