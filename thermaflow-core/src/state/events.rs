//! Commands, faults and run events

use crate::config::{ConfigError, Mode};
use crate::profile::PhaseId;
use crate::sensor::SensorFault;

/// Operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Start a run
    Start(Mode),
    /// Abort the current run
    Abort,
    /// Acknowledge a finished or aborted run and return to idle
    Acknowledge,
}

/// Faults that abort a run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Confirmed thermocouple fault
    Sensor(SensorFault),
    /// Phase ran out of time
    TimingOverrun { phase: PhaseId },
    /// Hard temperature ceiling reached
    SafetyLimitExceeded { temperature_c: f32 },
    /// Temperature sagged below a hold target for too long
    TargetNotSustained { phase: PhaseId },
    /// Oven too hot to start a run
    UnsafeStartTemperature { temperature_c: f32 },
}

/// Why a run was aborted
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortCause {
    /// Operator pressed abort
    Operator,
    Fault(Fault),
}

/// Why a phase ended
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvanceReason {
    /// Start conditions met
    StartChecked,
    /// Ramp target reached
    TargetReached,
    /// Ramp time budget used up, close enough to continue
    TimedOut { shortfall_c: f32 },
    /// Held at target for the dwell time
    DwellComplete,
    /// Fixed duration elapsed
    DurationElapsed,
    Immediate,
    /// Cooled below the threshold
    CooledBelow,
}

/// Events reported by the controller, one per tick at most
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunEvent {
    /// A run started
    Started(Mode),
    PhaseChanged { from: PhaseId, to: PhaseId },
    /// A ramp timed out short of its target but the run continues
    TargetMissed {
        phase: PhaseId,
        next: PhaseId,
        shortfall_c: f32,
    },
    Aborted(AbortCause),
    Completed(Mode),
}

/// Reasons a run cannot start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartError {
    /// A run is already in progress
    AlreadyRunning,
    /// The previous run must be acknowledged first
    AwaitingAcknowledge,
    /// Configuration or tuning cannot drive a run
    ConfigurationInvalid(ConfigError),
}

impl From<ConfigError> for StartError {
    fn from(err: ConfigError) -> Self {
        StartError::ConfigurationInvalid(err)
    }
}
