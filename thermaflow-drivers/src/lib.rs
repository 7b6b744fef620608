//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in thermaflow-core for the oven hardware:
//!
//! - Thermocouple converter (MAX6675 over SPI)
//! - Output stage (SSRs and fan relays on GPIO)
//! - Settings mirror (RAM image of the persisted settings)

#![no_std]
#![deny(unsafe_code)]

pub mod output;
pub mod sensor;
pub mod settings;
