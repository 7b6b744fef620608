//! RAM mirror of the persisted settings
//!
//! The control loop writes settings synchronously at phase boundaries,
//! but flash writes are slow and async. The mirror holds the full byte
//! image in RAM, marks written keys dirty, and lets a persistence task
//! drain the dirty keys into flash in the order they were written.

use heapless::Vec;
use thermaflow_core::config::settings::{ERASED, SETTINGS_LEN};
use thermaflow_core::config::SettingId;
use thermaflow_core::traits::{SettingsStore, StoreError};

/// Pending writes, oldest first
pub type DirtyKeys = Vec<(SettingId, u8), SETTINGS_LEN>;

/// In-RAM settings image with write tracking
#[derive(Debug, Clone)]
pub struct MirroredSettings {
    image: [u8; SETTINGS_LEN],
    /// Keys written since the last flush, in write order
    pending: Vec<SettingId, SETTINGS_LEN>,
}

impl Default for MirroredSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl MirroredSettings {
    /// Create an erased image
    pub const fn new() -> Self {
        Self {
            image: [ERASED; SETTINGS_LEN],
            pending: Vec::new(),
        }
    }

    /// Fill a key from flash without marking it dirty
    pub fn load(&mut self, id: SettingId, value: u8) {
        self.image[id.as_u8() as usize] = value;
    }

    /// Current value of a key
    pub fn get(&self, id: SettingId) -> u8 {
        self.image[id.as_u8() as usize]
    }

    /// Check if any key awaits persisting
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the pending writes with their current values
    ///
    /// A key written twice is flushed once, at the position of its
    /// first write, with its latest value.
    pub fn take_dirty(&mut self) -> DirtyKeys {
        let mut dirty = Vec::new();
        for id in self.pending.iter().copied() {
            // Both vectors share a capacity and pending never repeats a key
            let _ = dirty.push((id, self.get(id)));
        }
        self.pending.clear();
        dirty
    }

    /// Put writes back after a failed flush so they are retried
    ///
    /// Keys written again in the meantime keep their newer value.
    pub fn restore_dirty(&mut self, dirty: &DirtyKeys) {
        let mut merged: Vec<SettingId, SETTINGS_LEN> = Vec::new();
        for &(id, _) in dirty.iter() {
            let _ = merged.push(id);
        }
        for id in self.pending.iter().copied() {
            if !merged.contains(&id) {
                let _ = merged.push(id);
            }
        }
        self.pending = merged;
    }
}

impl SettingsStore for MirroredSettings {
    fn read(&mut self, id: SettingId) -> Result<u8, StoreError> {
        Ok(self.get(id))
    }

    fn write(&mut self, id: SettingId, value: u8) -> Result<(), StoreError> {
        self.image[id.as_u8() as usize] = value;
        if !self.pending.contains(&id) {
            self.pending.push(id).map_err(|_| StoreError::WriteFailed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_erased_and_clean() {
        let mut mirror = MirroredSettings::new();
        assert_eq!(mirror.read(SettingId::NeedsInit), Ok(ERASED));
        assert!(!mirror.is_dirty());
    }

    #[test]
    fn test_load_is_not_dirty() {
        let mut mirror = MirroredSettings::new();
        mirror.load(SettingId::MaxTemperature, 90);
        assert_eq!(mirror.read(SettingId::MaxTemperature), Ok(90));
        assert!(!mirror.is_dirty());
    }

    #[test]
    fn test_writes_drain_in_order() {
        let mut mirror = MirroredSettings::new();
        mirror.write(SettingId::SettingsChanged, 1).unwrap();
        mirror.write(SettingId::Output2Role, 0).unwrap();
        mirror.write(SettingId::SettingsChanged, 0).unwrap();

        let dirty = mirror.take_dirty();
        assert_eq!(
            dirty.as_slice(),
            &[(SettingId::SettingsChanged, 0), (SettingId::Output2Role, 0)]
        );
        assert!(!mirror.is_dirty());
        assert!(mirror.take_dirty().is_empty());
    }

    #[test]
    fn test_restore_after_failed_flush() {
        let mut mirror = MirroredSettings::new();
        mirror.write(SettingId::SoakDuty0, 40).unwrap();
        mirror.write(SettingId::SoakDuty1, 60).unwrap();
        let dirty = mirror.take_dirty();

        mirror.write(SettingId::SoakDuty1, 62).unwrap();
        mirror.write(SettingId::LearningMode, 0).unwrap();
        mirror.restore_dirty(&dirty);

        let retry = mirror.take_dirty();
        assert_eq!(
            retry.as_slice(),
            &[
                (SettingId::SoakDuty0, 40),
                (SettingId::SoakDuty1, 62),
                (SettingId::LearningMode, 0),
            ]
        );
    }

    #[test]
    fn test_every_key_fits() {
        let mut mirror = MirroredSettings::new();
        for id in SettingId::ALL {
            mirror.write(id, 0).unwrap();
        }
        assert_eq!(mirror.take_dirty().len(), SettingId::ALL.len());
    }
}
