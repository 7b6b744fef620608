//! Persistent settings store trait

use crate::config::SettingId;

/// Errors from the settings store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Backing storage could not be read
    ReadFailed,
    /// Backing storage could not be written
    WriteFailed,
}

/// Byte-addressable key-value settings store
///
/// Mirrors the EEPROM model of the original hardware: one byte per key.
/// Writes are durable but not transactional, so callers write one key
/// at a time and order the writes so a crash leaves a recoverable state.
pub trait SettingsStore {
    /// Read the byte stored under `id`
    fn read(&mut self, id: SettingId) -> Result<u8, StoreError>;

    /// Write a byte under `id`
    fn write(&mut self, id: SettingId, value: u8) -> Result<(), StoreError>;
}
