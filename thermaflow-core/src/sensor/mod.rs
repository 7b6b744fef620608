//! Temperature sensing
//!
//! Turns raw thermocouple readings into a filtered temperature and
//! confirmed faults.

pub mod reader;

pub use reader::{SensorFault, ThermocoupleReader};
