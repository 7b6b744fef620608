//! Oven control task
//!
//! Runs at slot rate: every slot drives the outputs from the actuator,
//! and the first slot of each control period applies pending commands
//! and runs one controller tick. Settings writes land in the RAM mirror;
//! flash I/O is left to the persistence task.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};

use thermaflow_core::traits::SensorError;
use thermaflow_core::OvenController;

use crate::channels::{COMMANDS, SAMPLE, SETTINGS, SETTINGS_FLUSH, STATUS};

#[embassy_executor::task]
pub async fn control_task(mut controller: OvenController, mut outputs: crate::OvenOutputs) {
    let tuning = *controller.tuning();
    let slots = tuning.slots_per_period.max(1);
    let slot_ms = (tuning.control_period_ms / slots as u32).max(1);
    info!(
        "Control task started: {}ms period, {} slots of {}ms",
        tuning.control_period_ms, slots, slot_ms
    );

    let mut ticker = Ticker::every(Duration::from_millis(slot_ms as u64));
    let start = Instant::now();
    let mut slot: u8 = 0;

    loop {
        if slot == 0 {
            let now_ms = start.elapsed().as_millis();
            control_period(&mut controller, now_ms);
        }

        controller.drive(slot, &mut outputs);
        slot = (slot + 1) % slots;

        ticker.next().await;
    }
}

/// Commands, one tick, then publish status
fn control_period(controller: &mut OvenController, now_ms: u64) {
    while let Ok(command) = COMMANDS.try_receive() {
        let result = SETTINGS.lock(|settings| {
            controller.handle(command, now_ms, &mut *settings.borrow_mut())
        });
        match result {
            Ok(Some(event)) => info!("{}", event),
            Ok(None) => {}
            Err(e) => warn!("Command {} rejected: {}", command, e),
        }
    }

    // A sampler that stopped publishing counts as a failed conversion
    let sample = SAMPLE
        .take()
        .unwrap_or(Err(SensorError::ConversionError));

    let (event, dirty) = SETTINGS.lock(|settings| {
        let mut settings = settings.borrow_mut();
        let event = controller.tick(now_ms, sample, &mut *settings);
        (event, settings.is_dirty())
    });

    if let Some(event) = event {
        info!("{}", event);
    }
    if dirty {
        SETTINGS_FLUSH.signal(());
    }

    STATUS.signal(controller.status(now_ms));
}
