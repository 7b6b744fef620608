//! Setting identifiers and byte encodings
//!
//! The identifiers match the EEPROM layout of the original controller, so
//! settings written by earlier firmware stay readable. Temperatures are
//! packed into a single byte here and nowhere else; everything past the
//! store boundary works in full-precision degrees.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::MAX_OUTPUTS;

/// Stored max temperature is offset by this many degrees to fit a byte
pub const TEMPERATURE_OFFSET: u16 = 150;

/// Bake temperature is stored divided by this step
pub const BAKE_TEMPERATURE_STEP: u16 = 5;

/// Longest bake duration index (18 hours)
pub const BAKE_MAX_DURATION: u8 = 176;

/// Last duration index that uses 5 minute steps (11h30)
const BAKE_FINE_STEPS_END: u8 = 137;

/// Byte value of erased storage
pub const ERASED: u8 = 0xFF;

/// Highest valid duty cycle
pub const MAX_DUTY_CYCLE: u8 = 100;

/// Setting identifiers
///
/// Gaps in the numbering are reserved by the original layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SettingId {
    /// Non-zero until the store has been initialized with defaults
    NeedsInit = 0,
    /// Role of output 0
    Output0Role = 1,
    /// Role of output 1
    Output1Role = 2,
    /// Role of output 2
    Output2Role = 3,
    /// Role of output 3
    Output3Role = 4,
    /// Peak reflow temperature, offset by [`TEMPERATURE_OFFSET`]
    MaxTemperature = 5,
    /// Configuration changed since duty cycles were learned
    SettingsChanged = 6,
    /// Bake temperature divided by [`BAKE_TEMPERATURE_STEP`]
    BakeTemperature = 7,
    /// Bake duration index
    BakeDuration = 8,
    /// Learning mode enabled
    LearningMode = 10,
    PresoakDuty0 = 11,
    PresoakDuty1 = 12,
    PresoakDuty2 = 13,
    PresoakDuty3 = 14,
    SoakDuty0 = 15,
    SoakDuty1 = 16,
    SoakDuty2 = 17,
    SoakDuty3 = 18,
    ReflowDuty0 = 19,
    ReflowDuty1 = 20,
    ReflowDuty2 = 21,
    ReflowDuty3 = 22,
}

/// Number of bytes spanned by the settings layout
pub const SETTINGS_LEN: usize = 23;

impl SettingId {
    /// Every defined setting, in storage order
    pub const ALL: [SettingId; 22] = [
        SettingId::NeedsInit,
        SettingId::Output0Role,
        SettingId::Output1Role,
        SettingId::Output2Role,
        SettingId::Output3Role,
        SettingId::MaxTemperature,
        SettingId::SettingsChanged,
        SettingId::BakeTemperature,
        SettingId::BakeDuration,
        SettingId::LearningMode,
        SettingId::PresoakDuty0,
        SettingId::PresoakDuty1,
        SettingId::PresoakDuty2,
        SettingId::PresoakDuty3,
        SettingId::SoakDuty0,
        SettingId::SoakDuty1,
        SettingId::SoakDuty2,
        SettingId::SoakDuty3,
        SettingId::ReflowDuty0,
        SettingId::ReflowDuty1,
        SettingId::ReflowDuty2,
        SettingId::ReflowDuty3,
    ];

    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_u8() == value)
    }

    /// Role key for an output
    pub fn output_role(output: usize) -> Option<Self> {
        match output {
            0 => Some(SettingId::Output0Role),
            1 => Some(SettingId::Output1Role),
            2 => Some(SettingId::Output2Role),
            3 => Some(SettingId::Output3Role),
            _ => None,
        }
    }

    /// Learned duty cycle key for a phase and output
    pub fn duty_cycle(phase: LearnedPhase, output: usize) -> Option<Self> {
        if output >= MAX_OUTPUTS {
            return None;
        }
        let base = match phase {
            LearnedPhase::Presoak => SettingId::PresoakDuty0,
            LearnedPhase::Soak => SettingId::SoakDuty0,
            LearnedPhase::Reflow => SettingId::ReflowDuty0,
        };
        Self::from_u8(base.as_u8() + output as u8)
    }
}

/// Phases whose heating duty cycles are learned and persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LearnedPhase {
    Presoak,
    Soak,
    Reflow,
}

impl LearnedPhase {
    /// All learned phases, in profile order
    pub const ALL: [LearnedPhase; 3] = [
        LearnedPhase::Presoak,
        LearnedPhase::Soak,
        LearnedPhase::Reflow,
    ];

    /// Table index
    pub fn index(self) -> usize {
        match self {
            LearnedPhase::Presoak => 0,
            LearnedPhase::Soak => 1,
            LearnedPhase::Reflow => 2,
        }
    }

    /// The boost element is only used while ramping up, never at peak,
    /// so it does not fight the primary elements around the reflow target.
    pub fn boost_enabled(self) -> bool {
        matches!(self, LearnedPhase::Presoak | LearnedPhase::Soak)
    }
}

/// Encode the peak reflow temperature for storage
pub fn encode_max_temperature(temperature_c: u16) -> u8 {
    temperature_c
        .saturating_sub(TEMPERATURE_OFFSET)
        .min(u8::MAX as u16) as u8
}

/// Decode a stored peak reflow temperature
pub fn decode_max_temperature(value: u8) -> u16 {
    value as u16 + TEMPERATURE_OFFSET
}

/// Encode the bake temperature for storage
pub fn encode_bake_temperature(temperature_c: u16) -> u8 {
    (temperature_c / BAKE_TEMPERATURE_STEP).min(u8::MAX as u16) as u8
}

/// Decode a stored bake temperature
pub fn decode_bake_temperature(value: u8) -> u16 {
    value as u16 * BAKE_TEMPERATURE_STEP
}

/// Convert a bake duration index to seconds
///
/// Index 0..=137 covers 5 minutes to 11h30 in 5 minute steps, then
/// 10 minute steps up to 18 hours at [`BAKE_MAX_DURATION`]. Larger
/// indices are clamped.
pub fn bake_duration_seconds(index: u8) -> u32 {
    let index = index.min(BAKE_MAX_DURATION) as u32;
    let fine_end = BAKE_FINE_STEPS_END as u32;
    let minutes = if index <= fine_end {
        (index + 1) * 5
    } else {
        (fine_end + 1) * 5 + (index - fine_end) * 10
    };
    minutes * 60
}
