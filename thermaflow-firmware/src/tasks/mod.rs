//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod control;
pub mod persistence;
pub mod sampler;
pub mod status;

pub use control::control_task;
pub use persistence::persistence_task;
pub use sampler::sampler_task;
pub use status::status_task;
