//! Run state machine
//!
//! The phase machine is explicit, forward-only and deterministic: the same
//! readings at the same times always produce the same transitions.

pub mod events;
pub mod machine;
pub mod run;

pub use events::{AbortCause, AdvanceReason, Command, Fault, RunEvent, StartError};
pub use machine::{CompletedPhase, PhaseMachine, Step};
pub use run::{PhaseProgress, RunState};
