//! Phase definitions
//!
//! A phase is a target, a time budget, a rule that decides when it is over
//! and the drive it applies to the heating elements and fans meanwhile.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::LearnedPhase;

/// Phase identifiers for both reflow and bake runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PhaseId {
    /// Sensor and start temperature check
    Init,
    /// Ramp to the presoak temperature
    Presoak,
    /// Ramp slowly through the soak band
    Soak,
    /// Ramp to peak and hold
    Reflow,
    /// Elements off, let the peak pass
    Waiting,
    /// Cooling until the boards can be handled
    CoolingBoardsIn,
    /// Cooling with the boards out until safe to restart
    CoolingBoardsOut,
    /// Bake: heat to just below the bake temperature
    Heatup,
    /// Bake: hold the bake temperature
    Bake,
    /// Bake: switch to cooling
    StartCooling,
    /// Bake: cool until safe to restart
    Cooling,
    /// Run aborted
    Abort,
}

impl PhaseId {
    /// Learned duty-cycle set this phase contributes to
    pub fn learned(self) -> Option<LearnedPhase> {
        match self {
            PhaseId::Presoak => Some(LearnedPhase::Presoak),
            PhaseId::Soak => Some(LearnedPhase::Soak),
            PhaseId::Reflow => Some(LearnedPhase::Reflow),
            _ => None,
        }
    }
}

/// When a phase is over
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransitionRule {
    /// Healthy sensor reading below `max_start_c`
    StartCheck { max_start_c: f32 },
    /// Within `tolerance_c` of target, or the time budget runs out
    Ramp {
        tolerance_c: f32,
        /// Abort instead of continuing when this far short at timeout
        max_shortfall_c: f32,
    },
    /// Reach target then hold it for `dwell_s`
    Hold {
        dwell_s: u32,
        /// Allowed sag below target once reached
        drop_c: f32,
        /// How long the sag may last
        grace_s: u32,
    },
    /// Fixed duration
    Timed,
    /// Over on the next evaluation
    Immediate,
    /// Temperature falls below `threshold_c`
    CoolBelow { threshold_c: f32 },
}

/// How the heating elements are driven during a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeatingDrive {
    Off,
    /// Learned duty cycles for the whole phase
    Fixed(LearnedPhase),
    /// Learned duty cycles until target, then on/off regulation around it
    Regulated(LearnedPhase),
}

/// Fan duty cycles during a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FanDrive {
    pub convection: u8,
    pub cooling: u8,
}

impl FanDrive {
    pub const OFF: Self = Self {
        convection: 0,
        cooling: 0,
    };
    pub const CONVECTION: Self = Self {
        convection: 100,
        cooling: 0,
    };
    pub const FULL: Self = Self {
        convection: 100,
        cooling: 100,
    };
}

/// One phase of a profile
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseDefinition {
    pub id: PhaseId,
    /// Temperature the phase drives toward, if it has one
    pub target_c: Option<f32>,
    /// Time budget; `None` for phases that wait on temperature alone
    pub max_duration_s: Option<u32>,
    /// Time to target on a well-tuned oven, the learning reference
    pub ideal_duration_s: Option<u32>,
    pub rule: TransitionRule,
    pub heating: HeatingDrive,
    pub fans: FanDrive,
}
