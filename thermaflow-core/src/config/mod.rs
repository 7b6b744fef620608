//! Configuration types
//!
//! Operator-editable oven configuration, its one-byte-per-key store layout,
//! learned duty cycles and the fixed control tuning.

pub mod learned;
pub mod persist;
pub mod settings;
pub mod tuning;
pub mod types;

pub use learned::{is_learned, seed_duty_cycle, LearnedSettings};
pub use persist::{
    initialize_if_needed, load_config, mark_settings_changed, save_bake_settings,
    save_max_temperature, save_output_role,
};
pub use settings::{LearnedPhase, SettingId, MAX_DUTY_CYCLE};
pub use tuning::{BakeTimings, ControlTuning, LearningTuning, ReflowTimings, SensorTuning};
pub use types::*;
