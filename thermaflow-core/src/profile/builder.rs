//! Reflow and bake profiles
//!
//! Profiles are rebuilt from the persisted configuration at every run
//! start, so a changed peak or bake temperature takes effect on the next
//! run without touching the phase machine.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::phase::{FanDrive, HeatingDrive, PhaseDefinition, PhaseId, TransitionRule};
use crate::config::{ControlTuning, LearnedPhase, Mode, OvenConfig};

/// Maximum phases in a profile
pub const MAX_PHASES: usize = 8;

/// Ordered phases of one run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profile {
    mode: Mode,
    phases: Vec<PhaseDefinition, MAX_PHASES>,
}

impl Profile {
    fn from_phases(mode: Mode, definitions: &[PhaseDefinition]) -> Self {
        let mut phases = Vec::new();
        for definition in definitions {
            if phases.push(*definition).is_err() {
                debug_assert!(false, "profile exceeds {} phases", MAX_PHASES);
                break;
            }
        }
        Self { mode, phases }
    }

    /// Build the profile for a mode
    pub fn for_mode(mode: Mode, config: &OvenConfig, tuning: &ControlTuning) -> Self {
        match mode {
            Mode::Reflow => Self::reflow(config, tuning),
            Mode::Bake => Self::bake(config, tuning),
        }
    }

    /// Reflow profile peaking at the configured max temperature
    pub fn reflow(config: &OvenConfig, tuning: &ControlTuning) -> Self {
        let timings = &tuning.reflow;
        let ramp = TransitionRule::Ramp {
            tolerance_c: tuning.target_tolerance_c,
            max_shortfall_c: tuning.max_ramp_shortfall_c,
        };

        Self::from_phases(
            Mode::Reflow,
            &[
                PhaseDefinition {
                    id: PhaseId::Init,
                    target_c: None,
                    max_duration_s: Some(tuning.init_max_s),
                    ideal_duration_s: None,
                    rule: TransitionRule::StartCheck {
                        max_start_c: tuning.start_max_c.min(timings.presoak_target_c),
                    },
                    heating: HeatingDrive::Off,
                    fans: FanDrive::OFF,
                },
                PhaseDefinition {
                    id: PhaseId::Presoak,
                    target_c: Some(timings.presoak_target_c),
                    max_duration_s: Some(timings.presoak_max_s),
                    ideal_duration_s: Some(timings.presoak_ideal_s),
                    rule: ramp,
                    heating: HeatingDrive::Fixed(LearnedPhase::Presoak),
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::Soak,
                    target_c: Some(timings.soak_target_c),
                    max_duration_s: Some(timings.soak_max_s),
                    ideal_duration_s: Some(timings.soak_ideal_s),
                    rule: ramp,
                    heating: HeatingDrive::Fixed(LearnedPhase::Soak),
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::Reflow,
                    target_c: Some(config.max_temperature_c as f32),
                    max_duration_s: Some(timings.reflow_max_s),
                    ideal_duration_s: Some(timings.reflow_ideal_s),
                    rule: TransitionRule::Hold {
                        dwell_s: timings.reflow_dwell_s,
                        drop_c: tuning.hold_drop_c,
                        grace_s: tuning.hold_grace_s,
                    },
                    heating: HeatingDrive::Regulated(LearnedPhase::Reflow),
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::Waiting,
                    target_c: None,
                    max_duration_s: Some(timings.waiting_s),
                    ideal_duration_s: None,
                    rule: TransitionRule::Timed,
                    heating: HeatingDrive::Off,
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::CoolingBoardsIn,
                    target_c: None,
                    max_duration_s: None,
                    ideal_duration_s: None,
                    rule: TransitionRule::CoolBelow {
                        threshold_c: timings.boards_out_c,
                    },
                    heating: HeatingDrive::Off,
                    fans: FanDrive::FULL,
                },
                PhaseDefinition {
                    id: PhaseId::CoolingBoardsOut,
                    target_c: None,
                    max_duration_s: None,
                    ideal_duration_s: None,
                    rule: TransitionRule::CoolBelow {
                        threshold_c: tuning.safe_restart_c,
                    },
                    heating: HeatingDrive::Off,
                    fans: FanDrive::FULL,
                },
            ],
        )
    }

    /// Bake profile at the configured temperature and duration
    pub fn bake(config: &OvenConfig, tuning: &ControlTuning) -> Self {
        let timings = &tuning.bake;
        let bake_c = config.bake_temperature_c as f32;
        let duration_s = config.bake_duration_s();

        Self::from_phases(
            Mode::Bake,
            &[
                PhaseDefinition {
                    id: PhaseId::Init,
                    target_c: None,
                    max_duration_s: Some(tuning.init_max_s),
                    ideal_duration_s: None,
                    rule: TransitionRule::StartCheck {
                        max_start_c: bake_c - timings.start_margin_c,
                    },
                    heating: HeatingDrive::Off,
                    fans: FanDrive::OFF,
                },
                PhaseDefinition {
                    id: PhaseId::Heatup,
                    target_c: Some(bake_c - timings.heatup_undershoot_c),
                    max_duration_s: Some(timings.heatup_max_s),
                    ideal_duration_s: None,
                    rule: TransitionRule::Ramp {
                        tolerance_c: tuning.target_tolerance_c,
                        max_shortfall_c: tuning.max_ramp_shortfall_c,
                    },
                    heating: HeatingDrive::Fixed(LearnedPhase::Presoak),
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::Bake,
                    target_c: Some(bake_c),
                    max_duration_s: Some(duration_s.saturating_add(timings.bake_margin_s)),
                    ideal_duration_s: None,
                    rule: TransitionRule::Hold {
                        dwell_s: duration_s,
                        drop_c: timings.hold_drop_c,
                        grace_s: timings.hold_grace_s,
                    },
                    heating: HeatingDrive::Regulated(LearnedPhase::Soak),
                    fans: FanDrive::CONVECTION,
                },
                PhaseDefinition {
                    id: PhaseId::StartCooling,
                    target_c: None,
                    max_duration_s: None,
                    ideal_duration_s: None,
                    rule: TransitionRule::Immediate,
                    heating: HeatingDrive::Off,
                    fans: FanDrive::FULL,
                },
                PhaseDefinition {
                    id: PhaseId::Cooling,
                    target_c: None,
                    max_duration_s: None,
                    ideal_duration_s: None,
                    rule: TransitionRule::CoolBelow {
                        threshold_c: tuning.safe_restart_c,
                    },
                    heating: HeatingDrive::Off,
                    fans: FanDrive::FULL,
                },
            ],
        )
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phases(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&PhaseDefinition> {
        self.phases.get(index)
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Position of a phase in the profile
    pub fn position(&self, id: PhaseId) -> Option<usize> {
        self.phases.iter().position(|p| p.id == id)
    }

    /// Definition of a phase by id
    pub fn find(&self, id: PhaseId) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }
}
