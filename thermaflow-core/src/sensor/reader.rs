//! Thermocouple reader
//!
//! Filters raw converter readings and confirms faults. A single bad sample
//! is ignored; `fault_confirm_samples` in a row latch a fault that only an
//! explicit [`ThermocoupleReader::reset_fault`] clears.

use crate::config::SensorTuning;
use crate::traits::SensorError;

/// Thermocouple fault as seen by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// Thermocouple disconnected or converter saturated/not responding
    OpenCircuit,
    /// Thermocouple shorted (implausibly low reading)
    ShortCircuit,
    /// No plausible reading obtained yet
    NoReading,
}

impl SensorFault {
    /// Fatal faults abort a run; `NoReading` only delays it
    pub fn is_fatal(self) -> bool {
        !matches!(self, SensorFault::NoReading)
    }
}

/// Filtered thermocouple reading with fault confirmation
#[derive(Debug, Clone)]
pub struct ThermocoupleReader {
    tuning: SensorTuning,
    /// Filtered temperature, `None` until the first plausible sample
    filtered: Option<f32>,
    /// Consecutive implausible samples
    bad_samples: u8,
    /// Confirmed fault
    latched: Option<SensorFault>,
}

impl ThermocoupleReader {
    pub fn new(tuning: SensorTuning) -> Self {
        Self {
            tuning,
            filtered: None,
            bad_samples: 0,
            latched: None,
        }
    }

    /// Feed one raw sample and get the filtered temperature
    ///
    /// While a fault is latched every call returns it, whatever the sample.
    pub fn push(&mut self, raw: Result<f32, SensorError>) -> Result<f32, SensorFault> {
        if let Some(fault) = self.latched {
            return Err(fault);
        }

        match self.classify(raw) {
            Ok(value) => {
                self.bad_samples = 0;
                let alpha = self.tuning.filter_alpha;
                let filtered = match self.filtered {
                    Some(prev) => alpha * value + (1.0 - alpha) * prev,
                    None => value,
                };
                self.filtered = Some(filtered);
                Ok(filtered)
            }
            Err(fault) => {
                self.bad_samples = self.bad_samples.saturating_add(1);
                if self.bad_samples >= self.tuning.fault_confirm_samples {
                    error!(
                        "Thermocouple fault confirmed after {} samples: {}",
                        self.bad_samples, fault
                    );
                    self.latched = Some(fault);
                    self.filtered = None;
                    return Err(fault);
                }

                debug!("Ignoring implausible thermocouple sample ({})", fault);
                self.filtered.ok_or(SensorFault::NoReading)
            }
        }
    }

    fn classify(&self, raw: Result<f32, SensorError>) -> Result<f32, SensorFault> {
        let value = match raw {
            Ok(value) => value,
            Err(SensorError::ShortCircuit) => return Err(SensorFault::ShortCircuit),
            Err(_) => return Err(SensorFault::OpenCircuit),
        };

        if !value.is_finite() || value >= self.tuning.max_plausible_c {
            Err(SensorFault::OpenCircuit)
        } else if value < self.tuning.min_plausible_c {
            Err(SensorFault::ShortCircuit)
        } else {
            Ok(value)
        }
    }

    /// Clear a latched fault (operator acknowledge or run start)
    pub fn reset_fault(&mut self) {
        if self.latched.take().is_some() {
            info!("Thermocouple fault cleared");
        }
        self.bad_samples = 0;
    }

    /// Last filtered temperature, if one is trusted
    pub fn temperature(&self) -> Option<f32> {
        if self.latched.is_some() {
            None
        } else {
            self.filtered
        }
    }

    /// Latched fault, if any
    pub fn fault(&self) -> Option<SensorFault> {
        self.latched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unfiltered() -> ThermocoupleReader {
        ThermocoupleReader::new(SensorTuning {
            filter_alpha: 1.0,
            ..SensorTuning::default()
        })
    }

    #[test]
    fn test_first_sample_passes_through() {
        let mut reader = ThermocoupleReader::new(SensorTuning::default());
        assert_eq!(reader.push(Ok(25.0)), Ok(25.0));
        assert_eq!(reader.temperature(), Some(25.0));
    }

    #[test]
    fn test_low_pass_filter() {
        let mut reader = ThermocoupleReader::new(SensorTuning::default());
        reader.push(Ok(20.0)).unwrap();
        // alpha 0.5: halfway to the new sample
        assert_eq!(reader.push(Ok(30.0)), Ok(25.0));
    }

    #[test]
    fn test_single_bad_sample_ignored() {
        let mut reader = unfiltered();
        reader.push(Ok(100.0)).unwrap();
        assert_eq!(reader.push(Ok(-100.0)), Ok(100.0));
        assert_eq!(reader.push(Ok(101.0)), Ok(101.0));
        assert_eq!(reader.fault(), None);
    }

    #[test]
    fn test_no_reading_yet() {
        let mut reader = unfiltered();
        assert_eq!(
            reader.push(Err(SensorError::OpenCircuit)),
            Err(SensorFault::NoReading)
        );
        assert!(!SensorFault::NoReading.is_fatal());
    }

    #[test]
    fn test_short_confirmed_after_three() {
        let mut reader = unfiltered();
        reader.push(Ok(25.0)).unwrap();
        assert!(reader.push(Ok(-45.0)).is_ok());
        assert!(reader.push(Ok(-45.0)).is_ok());
        assert_eq!(reader.push(Ok(-45.0)), Err(SensorFault::ShortCircuit));
        assert_eq!(reader.fault(), Some(SensorFault::ShortCircuit));
        assert_eq!(reader.temperature(), None);
    }

    #[test]
    fn test_open_circuit_classification() {
        let mut reader = unfiltered();
        reader.push(Err(SensorError::ConversionError)).ok();
        reader.push(Ok(f32::NAN)).ok();
        assert_eq!(reader.push(Ok(1023.75)), Err(SensorFault::OpenCircuit));
    }

    #[test]
    fn test_fault_latches_until_reset() {
        let mut reader = unfiltered();
        for _ in 0..3 {
            reader.push(Err(SensorError::OpenCircuit)).ok();
        }
        // Good samples do not heal a confirmed fault
        assert_eq!(reader.push(Ok(25.0)), Err(SensorFault::OpenCircuit));

        reader.reset_fault();
        assert_eq!(reader.fault(), None);
        assert_eq!(reader.push(Ok(25.0)), Ok(25.0));
    }

    #[test]
    fn test_good_sample_resets_counter() {
        let mut reader = unfiltered();
        reader.push(Ok(25.0)).unwrap();
        for _ in 0..10 {
            reader.push(Ok(-50.0)).ok();
            reader.push(Ok(-50.0)).ok();
            reader.push(Ok(25.0)).unwrap();
        }
        assert_eq!(reader.fault(), None);
    }
}
