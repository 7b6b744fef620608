//! Safety monitoring
//!
//! Detects fault conditions that must stop heating immediately.

pub mod monitor;

pub use monitor::{SafetyMonitor, SafetyStatus};
