//! Learned duty cycles
//!
//! Snapshot of the per-phase, per-output duty cycles loaded from the
//! settings store at run start. Values that are missing, out of range or
//! invalidated by a configuration change fall back to conservative seeds.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::settings::{LearnedPhase, SettingId, MAX_DUTY_CYCLE};
use super::types::{OutputRole, MAX_OUTPUTS};
use crate::traits::SettingsStore;

/// Seed duty cycle for a role in a learned phase
///
/// The bottom element carries most of the load; the top element is kept
/// lower so components are not scorched. Boost only helps while ramping.
pub fn seed_duty_cycle(phase: LearnedPhase, role: OutputRole) -> u8 {
    match (phase, role) {
        (LearnedPhase::Presoak, OutputRole::TopElement) => 80,
        (LearnedPhase::Presoak, OutputRole::BottomElement) => 100,
        (LearnedPhase::Presoak, OutputRole::BoostElement) => 60,
        (LearnedPhase::Soak, OutputRole::TopElement) => 50,
        (LearnedPhase::Soak, OutputRole::BottomElement) => 70,
        (LearnedPhase::Soak, OutputRole::BoostElement) => 30,
        (LearnedPhase::Reflow, OutputRole::TopElement) => 80,
        (LearnedPhase::Reflow, OutputRole::BottomElement) => 100,
        (LearnedPhase::Reflow, OutputRole::BoostElement) => 0,
        _ => 0,
    }
}

/// Check whether an output takes part in learning for a phase
pub fn is_learned(phase: LearnedPhase, role: OutputRole) -> bool {
    match role {
        OutputRole::BoostElement => phase.boost_enabled(),
        role => role.is_heating_element(),
    }
}

/// Learned settings snapshot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LearnedSettings {
    /// Duty cycles indexed by [`LearnedPhase::index`] then output
    duty: [[u8; MAX_OUTPUTS]; 3],
    /// Learning adjustments are persisted after each learned phase
    pub learning_mode: bool,
    /// Configuration changed since the duty cycles were learned
    pub settings_changed: bool,
}

impl LearnedSettings {
    /// Seed duty cycles for the given roles, with learning enabled
    pub fn seeded(roles: &[OutputRole; MAX_OUTPUTS]) -> Self {
        let mut duty = [[0; MAX_OUTPUTS]; 3];
        for phase in LearnedPhase::ALL {
            for (output, role) in roles.iter().enumerate() {
                duty[phase.index()][output] = seed_duty_cycle(phase, *role);
            }
        }

        Self {
            duty,
            learning_mode: true,
            settings_changed: false,
        }
    }

    /// Load learned settings for the given roles
    ///
    /// Never fails: unreadable flags are treated as "relearn" and unreadable
    /// duty cycles as missing.
    pub fn load<S: SettingsStore>(store: &mut S, roles: &[OutputRole; MAX_OUTPUTS]) -> Self {
        let mut settings = Self::seeded(roles);

        // Erased (0xFF) or unreadable flags mean the values cannot be trusted
        settings.settings_changed = !matches!(store.read(SettingId::SettingsChanged), Ok(0));
        settings.learning_mode = !matches!(store.read(SettingId::LearningMode), Ok(0));

        if settings.settings_changed {
            info!("Settings changed since last learning run, using seed duty cycles");
            settings.learning_mode = true;
            return settings;
        }

        for phase in LearnedPhase::ALL {
            for (output, role) in roles.iter().enumerate() {
                if !is_learned(phase, *role) {
                    continue;
                }
                let Some(id) = SettingId::duty_cycle(phase, output) else {
                    continue;
                };
                match store.read(id) {
                    Ok(value) if value <= MAX_DUTY_CYCLE => {
                        settings.duty[phase.index()][output] = value;
                    }
                    Ok(value) => {
                        warn!(
                            "Stored duty cycle {} out of range for {} output {}, using seed",
                            value, phase, output
                        );
                    }
                    Err(e) => {
                        warn!(
                            "Failed to read duty cycle for {} output {}: {}, using seed",
                            phase, output, e
                        );
                    }
                }
            }
        }

        settings
    }

    /// Duty cycle for an output in a learned phase
    pub fn duty_cycle(&self, phase: LearnedPhase, output: usize) -> u8 {
        self.duty[phase.index()].get(output).copied().unwrap_or(0)
    }

    /// Override a duty cycle (clamped to 0..=100)
    pub fn set_duty_cycle(&mut self, phase: LearnedPhase, output: usize, value: u8) {
        if let Some(slot) = self.duty[phase.index()].get_mut(output) {
            *slot = value.min(MAX_DUTY_CYCLE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::MemoryStore;
    use crate::config::OvenConfig;

    fn roles() -> [OutputRole; MAX_OUTPUTS] {
        OvenConfig::default().roles
    }

    fn trusted_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(SettingId::SettingsChanged, 0);
        store.set(SettingId::LearningMode, 1);
        store
    }

    #[test]
    fn test_seeded_values() {
        let settings = LearnedSettings::seeded(&roles());
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 0), 80);
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 1), 100);
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 2), 60);
        // Convection fan is never learned
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 3), 0);
        // Boost is off at peak
        assert_eq!(settings.duty_cycle(LearnedPhase::Reflow, 2), 0);
    }

    #[test]
    fn test_load_trusted_values() {
        let mut store = trusted_store();
        store.set(SettingId::SoakDuty0, 42);
        store.set(SettingId::SoakDuty1, 64);

        let settings = LearnedSettings::load(&mut store, &roles());
        assert!(!settings.settings_changed);
        assert!(settings.learning_mode);
        assert_eq!(settings.duty_cycle(LearnedPhase::Soak, 0), 42);
        assert_eq!(settings.duty_cycle(LearnedPhase::Soak, 1), 64);
    }

    #[test]
    fn test_out_of_range_falls_back_to_seed() {
        let mut store = trusted_store();
        store.set(SettingId::PresoakDuty0, 0xFF);
        store.set(SettingId::PresoakDuty1, 101);

        let settings = LearnedSettings::load(&mut store, &roles());
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 0), 80);
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 1), 100);
    }

    #[test]
    fn test_settings_changed_forces_seeds_and_learning() {
        let mut store = trusted_store();
        store.set(SettingId::SettingsChanged, 1);
        store.set(SettingId::LearningMode, 0);
        store.set(SettingId::PresoakDuty0, 12);

        let settings = LearnedSettings::load(&mut store, &roles());
        assert!(settings.settings_changed);
        assert!(settings.learning_mode);
        assert_eq!(settings.duty_cycle(LearnedPhase::Presoak, 0), 80);
    }

    #[test]
    fn test_erased_store_is_untrusted() {
        let mut store = MemoryStore::new();
        let settings = LearnedSettings::load(&mut store, &roles());
        assert!(settings.settings_changed);
        assert!(settings.learning_mode);
    }

    #[test]
    fn test_learning_mode_off() {
        let mut store = trusted_store();
        store.set(SettingId::LearningMode, 0);
        let settings = LearnedSettings::load(&mut store, &roles());
        assert!(!settings.learning_mode);
    }

    #[test]
    fn test_duty_cycle_round_trip() {
        let mut store = trusted_store();
        for value in 0..=100u8 {
            store
                .write(SettingId::ReflowDuty1, value)
                .unwrap();
            let settings = LearnedSettings::load(&mut store, &roles());
            assert_eq!(settings.duty_cycle(LearnedPhase::Reflow, 1), value);
        }
    }
}
