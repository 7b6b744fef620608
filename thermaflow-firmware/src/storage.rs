//! Settings flash partition
//!
//! Uses sequential-storage for wear-leveled key-value storage in the
//! last 64KB of flash. Each setting is its own map item, keyed by its
//! setting id, so a flush writes exactly the keys that changed.

use defmt::*;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use thermaflow_core::config::SettingId;
use thermaflow_drivers::settings::MirroredSettings;

/// 2MB flash on the Pico
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Settings partition at the end of flash (see memory.x)
pub const SETTINGS_PARTITION_SIZE: usize = 64 * 1024;
pub const SETTINGS_PARTITION_START: usize = FLASH_SIZE - SETTINGS_PARTITION_SIZE;

/// Flash range for the settings partition
pub const SETTINGS_RANGE: core::ops::Range<u32> =
    (SETTINGS_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Scratch buffer for one map item (key and value are one byte each)
const ITEM_BUFFER_SIZE: usize = 32;

/// Flash storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The map could not be read or written
    Storage,
}

/// Flash-backed settings partition
pub struct SettingsFlash {
    flash: Flash<'static, FLASH, Async, FLASH_SIZE>,
}

impl SettingsFlash {
    pub fn new(flash: Flash<'static, FLASH, Async, FLASH_SIZE>) -> Self {
        Self { flash }
    }

    /// Read one setting; `Ok(None)` if it was never written
    pub async fn read(&mut self, id: SettingId) -> Result<Option<u8>, FlashError> {
        let mut buffer = [0u8; ITEM_BUFFER_SIZE];
        map::fetch_item::<u8, u8, _>(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut buffer,
            &id.as_u8(),
        )
        .await
        .map_err(|_| FlashError::Storage)
    }

    /// Write one setting
    pub async fn write(&mut self, id: SettingId, value: u8) -> Result<(), FlashError> {
        let mut buffer = [0u8; ITEM_BUFFER_SIZE];
        map::store_item(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut buffer,
            &id.as_u8(),
            &value,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }

    /// Fill the mirror from flash
    ///
    /// Keys that were never written stay erased, which the core treats as
    /// an uninitialized store.
    pub async fn load_into(&mut self, mirror: &mut MirroredSettings) -> usize {
        let mut loaded = 0;
        for id in SettingId::ALL {
            match self.read(id).await {
                Ok(Some(value)) => {
                    mirror.load(id, value);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read setting {}: {}", id, e),
            }
        }
        loaded
    }
}
