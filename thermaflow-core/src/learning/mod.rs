//! Duty-cycle learning

pub mod engine;

pub use engine::{LearningEngine, TrajectoryError};
