//! Output stage drivers

pub mod gpio;

pub use gpio::GpioOutputs;
