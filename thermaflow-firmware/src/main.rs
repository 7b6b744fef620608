//! Thermaflow - Reflow Oven Firmware
//!
//! Main firmware binary for RP2040-based toaster-oven conversions.
//! A MAX6675 thermocouple on SPI0, four SSR/fan outputs on GPIO and
//! settings persisted in the last 64KB of flash.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::flash::Flash;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Blocking, Config as SpiConfig, Spi};
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use {defmt_rtt as _, panic_probe as _};

use thermaflow_core::config::{ControlTuning, OvenConfig};
use thermaflow_core::OvenController;
use thermaflow_drivers::output::GpioOutputs;
use thermaflow_drivers::sensor::Max6675;
use thermaflow_drivers::settings::MirroredSettings;

use crate::channels::{SETTINGS, SETTINGS_FLUSH};
use crate::storage::SettingsFlash;

mod channels;
mod storage;
mod tasks;

/// MAX6675 on an exclusive SPI0 device
pub type ThermocoupleSensor =
    Max6675<ExclusiveDevice<Spi<'static, SPI0, Blocking>, Output<'static>, Delay>>;

/// SSR and fan outputs
pub type OvenOutputs = GpioOutputs<Output<'static>>;

/// MAX6675 maximum SPI clock is 4.3MHz
const THERMOCOUPLE_SPI_HZ: u32 = 1_000_000;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Thermaflow firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Outputs first, so every SSR is driven off as early as possible
    // Pin assignments are board-specific (GPIO2..5: top, bottom, boost, fan)
    let outputs = GpioOutputs::new_active_high([
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_4, Level::Low),
        Output::new(p.PIN_5, Level::Low),
    ]);

    // MAX6675 is read-only: SCK=GPIO18, SO=GPIO16, CS=GPIO17
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = THERMOCOUPLE_SPI_HZ;
    let spi = Spi::new_blocking_rxonly(p.SPI0, p.PIN_18, p.PIN_16, spi_config);
    let cs = Output::new(p.PIN_17, Level::High);
    let spi_device = ExclusiveDevice::new(spi, cs, Delay).unwrap();
    let sensor = Max6675::new(spi_device);
    info!("Thermocouple initialized");

    // Settings: fill the RAM mirror from flash before the controller reads it
    let mut flash = SettingsFlash::new(Flash::new(p.FLASH, p.DMA_CH0));
    // The mirror is filled outside the lock; flash reads await
    let mut mirror = MirroredSettings::new();
    let count = flash.load_into(&mut mirror).await;
    SETTINGS.lock(|settings| *settings.borrow_mut() = mirror);
    info!("Loaded {} settings from flash", count);

    let tuning = ControlTuning::default();
    let controller = SETTINGS.lock(|settings| {
        match OvenController::load(&mut *settings.borrow_mut(), tuning) {
            Ok(controller) => controller,
            Err(e) => {
                error!("Failed to load oven settings: {}, using defaults", e);
                OvenController::new(OvenConfig::default(), tuning)
            }
        }
    });
    info!(
        "Oven configured: max {}C, bake {}C",
        controller.config().max_temperature_c,
        controller.config().bake_temperature_c
    );

    // First boot writes defaults into the mirror
    if SETTINGS.lock(|settings| settings.borrow().is_dirty()) {
        SETTINGS_FLUSH.signal(());
    }

    // Spawn tasks
    spawner.spawn(tasks::persistence_task(flash)).unwrap();
    spawner.spawn(tasks::sampler_task(sensor)).unwrap();
    spawner.spawn(tasks::status_task()).unwrap();
    spawner
        .spawn(tasks::control_task(controller, outputs))
        .unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
