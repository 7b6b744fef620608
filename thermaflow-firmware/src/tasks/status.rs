//! Status reporter task
//!
//! Logs the oven status published by the control loop. A display layer
//! would consume the same signal.

use defmt::*;

use crate::channels::STATUS;

/// Log every Nth status update while idle
const IDLE_LOG_EVERY: u32 = 30;

#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started");

    let mut updates: u32 = 0;
    let mut last_fault = None;
    loop {
        let status = STATUS.wait().await;
        updates = updates.wrapping_add(1);

        if status.fault != last_fault {
            match status.fault {
                Some(fault) => warn!("Fault active: {} at {}C", fault, status.temperature_c),
                None => info!("Fault cleared"),
            }
            last_fault = status.fault;
        }

        let running = status.outcome.is_none() && status.phase.is_some();
        if running || updates % IDLE_LOG_EVERY == 0 {
            info!(
                "{} {}: {}C (target {}), {}s in phase, {}s in run, heating={}",
                status.mode,
                status.phase,
                status.temperature_c,
                status.target_c,
                status.phase_elapsed_s,
                status.run_elapsed_s,
                status.heating
            );
        }
    }
}
