//! Thermal profiles
//!
//! A profile is the ordered list of phases a run walks through.

pub mod builder;
pub mod phase;

pub use builder::{Profile, MAX_PHASES};
pub use phase::{FanDrive, HeatingDrive, PhaseDefinition, PhaseId, TransitionRule};
