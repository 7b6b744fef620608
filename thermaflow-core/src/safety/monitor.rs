//! Safety monitor implementation
//!
//! Watches the filtered oven temperature against the hard ceiling and
//! tracks confirmed thermocouple faults. The ceiling is checked first and
//! applies whether or not a run is active.

use crate::sensor::SensorFault;
use crate::state::Fault;

/// Safety condition status
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafetyStatus {
    /// All conditions normal
    Ok,
    /// Safety condition violated
    Fault(Fault),
}

/// Safety monitor for fault detection
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    /// Absolute temperature ceiling (°C)
    ceiling_c: f32,
    /// Last trusted temperature
    temperature_c: Option<f32>,
    /// Confirmed sensor fault
    sensor_fault: Option<SensorFault>,
}

impl SafetyMonitor {
    pub fn new(ceiling_c: f32) -> Self {
        Self {
            ceiling_c,
            temperature_c: None,
            sensor_fault: None,
        }
    }

    /// Update from the thermocouple reader's output
    ///
    /// A non-fatal `NoReading` leaves the last temperature in place.
    pub fn update(&mut self, reading: Result<f32, SensorFault>) {
        match reading {
            Ok(temperature_c) => {
                self.temperature_c = Some(temperature_c);
                self.sensor_fault = None;
            }
            Err(fault) if fault.is_fatal() => {
                self.temperature_c = None;
                self.sensor_fault = Some(fault);
            }
            Err(_) => {}
        }
    }

    /// Forget a confirmed sensor fault once the reader has been reset
    pub fn clear_sensor_fault(&mut self) {
        self.sensor_fault = None;
    }

    /// Check all safety conditions
    ///
    /// Returns the highest-priority fault, or Ok if all conditions are normal.
    pub fn check(&self) -> SafetyStatus {
        if let Some(temperature_c) = self.temperature_c {
            if temperature_c >= self.ceiling_c {
                return SafetyStatus::Fault(Fault::SafetyLimitExceeded { temperature_c });
            }
        }

        if let Some(fault) = self.sensor_fault {
            return SafetyStatus::Fault(Fault::Sensor(fault));
        }

        SafetyStatus::Ok
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature_c
    }
}
