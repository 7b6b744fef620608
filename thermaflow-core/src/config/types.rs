//! Oven configuration types
//!
//! These types represent the operator-editable oven configuration. It is
//! persisted one byte per setting through [`crate::traits::SettingsStore`];
//! see [`super::settings`] for the byte encodings.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::settings::{bake_duration_seconds, BAKE_MAX_DURATION};

/// Number of physical output channels
pub const MAX_OUTPUTS: usize = 4;

/// Lowest selectable peak reflow temperature (°C)
pub const MIN_REFLOW_TEMPERATURE_C: u16 = 200;

/// Highest selectable peak reflow temperature (°C)
pub const MAX_REFLOW_TEMPERATURE_C: u16 = 280;

/// Minimum temperature for baking (°C)
pub const BAKE_MIN_TEMPERATURE_C: u16 = 40;

/// Maximum temperature for baking (°C)
pub const BAKE_MAX_TEMPERATURE_C: u16 = 200;

/// Functional role of an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum OutputRole {
    #[default]
    Unused = 0,
    TopElement = 1,
    BottomElement = 2,
    BoostElement = 3,
    ConvectionFan = 4,
    CoolingFan = 5,
}

impl OutputRole {
    /// Get the stored byte for this role
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a stored byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OutputRole::Unused),
            1 => Some(OutputRole::TopElement),
            2 => Some(OutputRole::BottomElement),
            3 => Some(OutputRole::BoostElement),
            4 => Some(OutputRole::ConvectionFan),
            5 => Some(OutputRole::CoolingFan),
            _ => None,
        }
    }

    /// Heating elements are the only channels whose duty cycle is learned
    pub fn is_heating_element(self) -> bool {
        matches!(
            self,
            OutputRole::TopElement | OutputRole::BottomElement | OutputRole::BoostElement
        )
    }

    /// Check if this is a fan role
    pub fn is_fan(self) -> bool {
        matches!(self, OutputRole::ConvectionFan | OutputRole::CoolingFan)
    }
}

/// Which kind of run to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Solder reflow: presoak, soak, reflow, cool
    Reflow,
    /// Constant-temperature bake for a set duration
    Bake,
}

/// Configuration errors that block a run from starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No output is assigned a heating role
    NoHeatingElement,
    /// A boost element is assigned without a top or bottom element
    BoostWithoutPrimary,
    /// Peak reflow temperature outside the selectable range
    ReflowTemperatureOutOfRange(u16),
    /// Peak reflow temperature would reach the safety ceiling
    ReflowTemperatureAboveCeiling(u16),
    /// Bake temperature outside the selectable range
    BakeTemperatureOutOfRange(u16),
    /// Bake duration index beyond the longest bake
    BakeDurationOutOfRange(u8),
    /// A control tuning constant is unusable
    InvalidTuning,
}

/// Operator-editable oven configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OvenConfig {
    /// Role of each physical output
    pub roles: [OutputRole; MAX_OUTPUTS],
    /// Peak reflow temperature (°C)
    pub max_temperature_c: u16,
    /// Bake temperature (°C, multiple of 5)
    pub bake_temperature_c: u16,
    /// Bake duration index (see [`bake_duration_seconds`])
    pub bake_duration: u8,
}

impl Default for OvenConfig {
    fn default() -> Self {
        Self {
            roles: [
                OutputRole::TopElement,
                OutputRole::BottomElement,
                OutputRole::BoostElement,
                OutputRole::ConvectionFan,
            ],
            max_temperature_c: 240,
            bake_temperature_c: 120,
            bake_duration: 11, // 1 hour
        }
    }
}

impl OvenConfig {
    /// Check the configuration can drive a run
    ///
    /// `safety_ceiling_c` is the absolute hard limit; the peak reflow
    /// temperature must stay below it.
    pub fn validate(&self, safety_ceiling_c: f32) -> Result<(), ConfigError> {
        if !self.roles.iter().any(|r| r.is_heating_element()) {
            return Err(ConfigError::NoHeatingElement);
        }

        let has_boost = self.roles.contains(&OutputRole::BoostElement);
        let has_primary = self
            .roles
            .iter()
            .any(|r| matches!(r, OutputRole::TopElement | OutputRole::BottomElement));
        if has_boost && !has_primary {
            return Err(ConfigError::BoostWithoutPrimary);
        }

        if !(MIN_REFLOW_TEMPERATURE_C..=MAX_REFLOW_TEMPERATURE_C).contains(&self.max_temperature_c)
        {
            return Err(ConfigError::ReflowTemperatureOutOfRange(
                self.max_temperature_c,
            ));
        }
        if self.max_temperature_c as f32 >= safety_ceiling_c {
            return Err(ConfigError::ReflowTemperatureAboveCeiling(
                self.max_temperature_c,
            ));
        }

        if !(BAKE_MIN_TEMPERATURE_C..=BAKE_MAX_TEMPERATURE_C).contains(&self.bake_temperature_c) {
            return Err(ConfigError::BakeTemperatureOutOfRange(
                self.bake_temperature_c,
            ));
        }
        if self.bake_duration > BAKE_MAX_DURATION {
            return Err(ConfigError::BakeDurationOutOfRange(self.bake_duration));
        }

        Ok(())
    }

    /// Role assigned to an output
    pub fn role(&self, index: usize) -> OutputRole {
        self.roles.get(index).copied().unwrap_or_default()
    }

    /// Indices of outputs assigned a heating role
    pub fn heating_outputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_heating_element())
            .map(|(i, _)| i)
    }

    /// Bake duration in seconds
    pub fn bake_duration_s(&self) -> u32 {
        bake_duration_seconds(self.bake_duration)
    }
}
