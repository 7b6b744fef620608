//! Thermocouple sampler task
//!
//! Reads the MAX6675 at a fixed rate and publishes each raw reading to
//! the sample slot. Filtering and fault confirmation happen in the
//! control loop.

use defmt::*;
use embassy_time::{Duration, Ticker};

use thermaflow_core::traits::TemperatureSensor;

use crate::channels::SAMPLE;

/// Sample interval; must not be shorter than the MAX6675 conversion time
pub const SAMPLE_INTERVAL_MS: u64 = 250;

#[embassy_executor::task]
pub async fn sampler_task(mut sensor: crate::ThermocoupleSensor) {
    info!("Sampler task started");

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_INTERVAL_MS));

    loop {
        ticker.next().await;

        let reading = sensor.read_celsius();
        match reading {
            Ok(temperature_c) => trace!("Thermocouple: {}C", temperature_c),
            Err(e) => debug!("Thermocouple read failed: {}", e),
        }
        SAMPLE.publish(reading);
    }
}
