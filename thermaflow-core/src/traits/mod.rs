//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic
//! and hardware-specific implementations.

pub mod output;
pub mod sensor;
pub mod settings;

pub use output::OutputDriver;
pub use sensor::{SensorError, TemperatureSensor};
pub use settings::{SettingsStore, StoreError};
