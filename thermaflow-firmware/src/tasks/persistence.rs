//! Settings persistence task
//!
//! Waits for the control loop to flag dirty settings and writes them to
//! flash one key at a time, in the order the controller wrote them. A
//! failed write puts the unwritten keys back so the next flush retries.

use defmt::*;
use embassy_time::{Duration, Timer};

use crate::channels::{SETTINGS, SETTINGS_FLUSH};
use crate::storage::SettingsFlash;

/// Back-off before retrying a failed flush
const RETRY_DELAY_MS: u64 = 1000;

#[embassy_executor::task]
pub async fn persistence_task(mut flash: SettingsFlash) {
    info!("Persistence task started");

    loop {
        SETTINGS_FLUSH.wait().await;

        let dirty = SETTINGS.lock(|settings| settings.borrow_mut().take_dirty());
        if dirty.is_empty() {
            continue;
        }
        debug!("Flushing {} settings", dirty.len());

        let mut failed_at = None;
        for (index, &(id, value)) in dirty.iter().enumerate() {
            if let Err(e) = flash.write(id, value).await {
                warn!("Failed to persist setting {}: {}", id, e);
                failed_at = Some(index);
                break;
            }
        }

        if let Some(index) = failed_at {
            let mut remaining = dirty.clone();
            remaining.rotate_left(index);
            remaining.truncate(dirty.len() - index);
            SETTINGS.lock(|settings| settings.borrow_mut().restore_dirty(&remaining));

            Timer::after(Duration::from_millis(RETRY_DELAY_MS)).await;
            SETTINGS_FLUSH.signal(());
        }
    }
}
