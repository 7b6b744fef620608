//! Output channels and duty-cycle actuation

pub mod actuator;
pub mod channel;

pub use actuator::DutyCycleActuator;
pub use channel::{OutputBank, OutputChannel};
