//! Configuration persistence
//!
//! Loads and edits the oven configuration in the settings store. Every
//! helper writes one key at a time, ordered so that an interrupted edit
//! leaves the store in a state the next boot can recover from.

use super::settings::{
    decode_bake_temperature, decode_max_temperature, encode_bake_temperature,
    encode_max_temperature, SettingId, BAKE_MAX_DURATION,
};
use super::types::{
    OutputRole, OvenConfig, BAKE_MAX_TEMPERATURE_C, BAKE_MIN_TEMPERATURE_C, MAX_OUTPUTS,
    MAX_REFLOW_TEMPERATURE_C, MIN_REFLOW_TEMPERATURE_C,
};
use crate::traits::{SettingsStore, StoreError};

/// Write defaults into an uninitialized store
///
/// Returns `true` if defaults were written. The init marker is written
/// last, so a crash part-way through re-runs initialization on next boot.
pub fn initialize_if_needed<S: SettingsStore>(store: &mut S) -> Result<bool, StoreError> {
    if store.read(SettingId::NeedsInit)? == 0 {
        return Ok(false);
    }

    warn!("Settings store is not initialized, writing defaults");

    let config = OvenConfig::default();
    for (output, role) in config.roles.iter().enumerate() {
        if let Some(id) = SettingId::output_role(output) {
            store.write(id, role.as_u8())?;
        }
    }
    store.write(
        SettingId::MaxTemperature,
        encode_max_temperature(config.max_temperature_c),
    )?;
    store.write(
        SettingId::BakeTemperature,
        encode_bake_temperature(config.bake_temperature_c),
    )?;
    store.write(SettingId::BakeDuration, config.bake_duration)?;
    store.write(SettingId::LearningMode, 1)?;
    store.write(SettingId::SettingsChanged, 1)?;
    store.write(SettingId::NeedsInit, 0)?;

    Ok(true)
}

/// Load the oven configuration
///
/// Bytes that do not decode to a valid value fall back to the default
/// for that setting. Only store read failures are errors.
pub fn load_config<S: SettingsStore>(store: &mut S) -> Result<OvenConfig, StoreError> {
    let defaults = OvenConfig::default();
    let mut config = defaults;

    for output in 0..MAX_OUTPUTS {
        let Some(id) = SettingId::output_role(output) else {
            continue;
        };
        let value = store.read(id)?;
        config.roles[output] = match OutputRole::from_u8(value) {
            Some(role) => role,
            None => {
                warn!("Unknown role {} for output {}, leaving it unused", value, output);
                OutputRole::Unused
            }
        };
    }

    let max_temperature_c = decode_max_temperature(store.read(SettingId::MaxTemperature)?);
    if (MIN_REFLOW_TEMPERATURE_C..=MAX_REFLOW_TEMPERATURE_C).contains(&max_temperature_c) {
        config.max_temperature_c = max_temperature_c;
    } else {
        warn!(
            "Stored max temperature {}C out of range, using {}C",
            max_temperature_c, defaults.max_temperature_c
        );
    }

    let bake_temperature_c = decode_bake_temperature(store.read(SettingId::BakeTemperature)?);
    if (BAKE_MIN_TEMPERATURE_C..=BAKE_MAX_TEMPERATURE_C).contains(&bake_temperature_c) {
        config.bake_temperature_c = bake_temperature_c;
    } else {
        warn!(
            "Stored bake temperature {}C out of range, using {}C",
            bake_temperature_c, defaults.bake_temperature_c
        );
    }

    let bake_duration = store.read(SettingId::BakeDuration)?;
    if bake_duration <= BAKE_MAX_DURATION {
        config.bake_duration = bake_duration;
    } else {
        warn!("Stored bake duration {} out of range", bake_duration);
    }

    Ok(config)
}

/// Flag that learned duty cycles no longer match the configuration
///
/// Re-enables learning mode, so the oven keeps relearning until the new
/// configuration converges.
pub fn mark_settings_changed<S: SettingsStore>(store: &mut S) -> Result<(), StoreError> {
    store.write(SettingId::SettingsChanged, 1)?;
    store.write(SettingId::LearningMode, 1)
}

/// Assign a role to an output
///
/// The settings-changed flag is written before the role: if power is lost
/// in between, the worst case is an unnecessary relearn.
pub fn save_output_role<S: SettingsStore>(
    store: &mut S,
    output: usize,
    role: OutputRole,
) -> Result<(), StoreError> {
    let Some(id) = SettingId::output_role(output) else {
        debug_assert!(false, "output index out of range");
        return Ok(());
    };

    if store.read(id)? == role.as_u8() {
        return Ok(());
    }

    info!("Output {} assigned {}", output, role);
    mark_settings_changed(store)?;
    store.write(id, role.as_u8())
}

/// Set the peak reflow temperature (clamped to the selectable range)
pub fn save_max_temperature<S: SettingsStore>(
    store: &mut S,
    temperature_c: u16,
) -> Result<(), StoreError> {
    let temperature_c = temperature_c.clamp(MIN_REFLOW_TEMPERATURE_C, MAX_REFLOW_TEMPERATURE_C);
    let encoded = encode_max_temperature(temperature_c);

    if store.read(SettingId::MaxTemperature)? == encoded {
        return Ok(());
    }

    info!("Max temperature set to {}C", temperature_c);
    mark_settings_changed(store)?;
    store.write(SettingId::MaxTemperature, encoded)
}

/// Set bake temperature and duration
///
/// Baking does not use learned values, so this does not invalidate them.
pub fn save_bake_settings<S: SettingsStore>(
    store: &mut S,
    temperature_c: u16,
    duration: u8,
) -> Result<(), StoreError> {
    let temperature_c = temperature_c.clamp(BAKE_MIN_TEMPERATURE_C, BAKE_MAX_TEMPERATURE_C);
    store.write(
        SettingId::BakeTemperature,
        encode_bake_temperature(temperature_c),
    )?;
    store.write(SettingId::BakeDuration, duration.min(BAKE_MAX_DURATION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ERASED;
    use crate::config::test_support::MemoryStore;

    #[test]
    fn test_initialize_fresh_store() {
        let mut store = MemoryStore::new();
        assert_eq!(initialize_if_needed(&mut store), Ok(true));
        assert_eq!(store.get(SettingId::NeedsInit), 0);
        assert_eq!(store.get(SettingId::SettingsChanged), 1);
        assert_eq!(store.get(SettingId::LearningMode), 1);

        // Init marker is written last
        let last = store.writes.last().unwrap();
        assert_eq!(*last, (SettingId::NeedsInit, 0));

        // Second call is a no-op
        let writes = store.writes.len();
        assert_eq!(initialize_if_needed(&mut store), Ok(false));
        assert_eq!(store.writes.len(), writes);
    }

    #[test]
    fn test_load_defaults_after_init() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        let config = load_config(&mut store).unwrap();
        assert_eq!(config, OvenConfig::default());
    }

    #[test]
    fn test_load_bad_bytes_fall_back() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        store.set(SettingId::Output2Role, 9);
        store.set(SettingId::MaxTemperature, ERASED);
        store.set(SettingId::BakeDuration, 200);

        let config = load_config(&mut store).unwrap();
        assert_eq!(config.roles[2], OutputRole::Unused);
        assert_eq!(config.max_temperature_c, 240);
        assert_eq!(config.bake_duration, OvenConfig::default().bake_duration);
    }

    #[test]
    fn test_role_change_marks_settings_changed_first() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        store.set(SettingId::SettingsChanged, 0);
        store.writes.clear();

        save_output_role(&mut store, 3, OutputRole::CoolingFan).unwrap();
        assert_eq!(
            store.writes.as_slice(),
            &[
                (SettingId::SettingsChanged, 1),
                (SettingId::LearningMode, 1),
                (SettingId::Output3Role, OutputRole::CoolingFan.as_u8()),
            ]
        );
    }

    #[test]
    fn test_unchanged_role_writes_nothing() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        store.writes.clear();

        save_output_role(&mut store, 0, OutputRole::TopElement).unwrap();
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_max_temperature_change() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        store.set(SettingId::SettingsChanged, 0);

        store.set(SettingId::LearningMode, 0);

        save_max_temperature(&mut store, 250).unwrap();
        assert_eq!(store.get(SettingId::SettingsChanged), 1);
        assert_eq!(store.get(SettingId::LearningMode), 1);
        assert_eq!(load_config(&mut store).unwrap().max_temperature_c, 250);

        // Clamped to the selectable range
        save_max_temperature(&mut store, 400).unwrap();
        assert_eq!(load_config(&mut store).unwrap().max_temperature_c, 280);
    }

    #[test]
    fn test_bake_settings_keep_learning() {
        let mut store = MemoryStore::new();
        initialize_if_needed(&mut store).unwrap();
        store.set(SettingId::SettingsChanged, 0);

        save_bake_settings(&mut store, 85, 23).unwrap();
        assert_eq!(store.get(SettingId::SettingsChanged), 0);

        let config = load_config(&mut store).unwrap();
        assert_eq!(config.bake_temperature_c, 85);
        assert_eq!(config.bake_duration, 23);
    }
}
