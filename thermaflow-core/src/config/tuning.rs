//! Control tuning constants
//!
//! Thresholds, timings and gains that shape the control loop. None of these
//! are operator-editable; they are fixed per build but kept out of the
//! control code so they can be validated against a reference oven.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::ConfigError;

/// Thermocouple filtering and fault confirmation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorTuning {
    /// Single-pole low-pass weight of a new sample (1.0 = unfiltered)
    pub filter_alpha: f32,
    /// Consecutive implausible samples before a fault is confirmed
    pub fault_confirm_samples: u8,
    /// Readings below this are implausible (shorted thermocouple)
    pub min_plausible_c: f32,
    /// Readings at or above this are implausible (saturated converter)
    pub max_plausible_c: f32,
}

impl Default for SensorTuning {
    fn default() -> Self {
        Self {
            filter_alpha: 0.5,
            fault_confirm_samples: 3,
            min_plausible_c: -40.0,
            max_plausible_c: 1023.0, // MAX6675 full scale is 1023.75°C
        }
    }
}

/// Duty-cycle learning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LearningTuning {
    /// Duty cycle percent per percent of relative time error
    pub gain: f32,
    /// Largest adjustment applied to one channel in one run
    pub max_step: u8,
    /// Relative time error within which a phase counts as learned
    pub converged_band: f32,
}

impl Default for LearningTuning {
    fn default() -> Self {
        Self {
            gain: 0.5,
            max_step: 10,
            converged_band: 0.1,
        }
    }
}

/// Reflow profile timings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReflowTimings {
    pub presoak_target_c: f32,
    pub presoak_ideal_s: u32,
    pub presoak_max_s: u32,
    pub soak_target_c: f32,
    pub soak_ideal_s: u32,
    pub soak_max_s: u32,
    /// Ideal time to ramp from soak to peak
    pub reflow_ideal_s: u32,
    pub reflow_max_s: u32,
    /// Time to hold at peak once reached
    pub reflow_dwell_s: u32,
    /// Post-peak wait before cooling starts
    pub waiting_s: u32,
    /// Boards may be touched below this
    pub boards_out_c: f32,
}

impl Default for ReflowTimings {
    fn default() -> Self {
        Self {
            presoak_target_c: 150.0,
            presoak_ideal_s: 70,
            presoak_max_s: 90,
            soak_target_c: 200.0,
            soak_ideal_s: 90,
            soak_max_s: 150,
            reflow_ideal_s: 60,
            reflow_max_s: 180,
            reflow_dwell_s: 15,
            waiting_s: 20,
            boards_out_c: 100.0,
        }
    }
}

/// Bake profile timings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BakeTimings {
    /// Heat-up stops this far below the bake temperature
    pub heatup_undershoot_c: f32,
    pub heatup_max_s: u32,
    /// The oven must start at least this far below the bake temperature
    pub start_margin_c: f32,
    /// Extra time allowed on top of the bake duration
    pub bake_margin_s: u32,
    /// Allowed sag below the bake temperature
    pub hold_drop_c: f32,
    pub hold_grace_s: u32,
}

impl Default for BakeTimings {
    fn default() -> Self {
        Self {
            heatup_undershoot_c: 5.0,
            heatup_max_s: 1800,
            start_margin_c: 10.0,
            bake_margin_s: 600,
            hold_drop_c: 5.0,
            hold_grace_s: 120,
        }
    }
}

/// Complete control tuning
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlTuning {
    /// Length of one control period (one phase evaluation)
    pub control_period_ms: u32,
    /// ON/OFF slots per control period
    pub slots_per_period: u8,
    /// Heating channels allowed ON in the same slot
    pub max_simultaneous_heaters: u8,
    /// Absolute hard ceiling; always fatal
    pub safety_ceiling_c: f32,
    /// A run may only start below this
    pub start_max_c: f32,
    /// Oven is safe to open and start again below this
    pub safe_restart_c: f32,
    /// Time allowed in Init to obtain a healthy reading
    pub init_max_s: u32,
    /// Ramp phases count as arrived this close to target
    pub target_tolerance_c: f32,
    /// Ramp timeout shortfall beyond which the run aborts
    pub max_ramp_shortfall_c: f32,
    /// Reflow hold: allowed sag below the peak
    pub hold_drop_c: f32,
    /// Reflow hold: how long the sag may last
    pub hold_grace_s: u32,
    /// Regulated phases turn heat back on this far below target
    pub regulation_hysteresis_c: f32,
    /// Regulated phases cut heat when `T + rate * lookahead` reaches target
    pub inertia_lookahead_s: f32,
    pub sensor: SensorTuning,
    pub learning: LearningTuning,
    pub reflow: ReflowTimings,
    pub bake: BakeTimings,
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            control_period_ms: 1000,
            slots_per_period: 50, // one 50Hz mains cycle per slot
            max_simultaneous_heaters: 2,
            safety_ceiling_c: 290.0,
            start_max_c: 50.0,
            safe_restart_c: 50.0,
            init_max_s: 10,
            target_tolerance_c: 0.5,
            max_ramp_shortfall_c: 25.0,
            hold_drop_c: 1.5,
            hold_grace_s: 10,
            regulation_hysteresis_c: 1.0,
            inertia_lookahead_s: 2.0,
            sensor: SensorTuning::default(),
            learning: LearningTuning::default(),
            reflow: ReflowTimings::default(),
            bake: BakeTimings::default(),
        }
    }
}

impl ControlTuning {
    /// Reject constants the control loop cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensor = &self.sensor;
        let reflow = &self.reflow;

        let ok = self.control_period_ms > 0
            && self.slots_per_period > 0
            && self.max_simultaneous_heaters > 0
            && sensor.filter_alpha > 0.0
            && sensor.filter_alpha <= 1.0
            && sensor.fault_confirm_samples > 0
            && sensor.min_plausible_c < sensor.max_plausible_c
            && self.learning.gain >= 0.0
            && self.learning.max_step <= 100
            && self.safe_restart_c < reflow.boards_out_c
            && reflow.presoak_target_c < reflow.soak_target_c
            && reflow.presoak_ideal_s > 0
            && reflow.soak_ideal_s > 0
            && reflow.reflow_ideal_s > 0
            && self.hold_grace_s < reflow.reflow_dwell_s + reflow.reflow_max_s;

        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidTuning)
        }
    }
}
