//! Temperature sensor trait

/// Errors reported by a temperature sensor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Thermocouple disconnected (open circuit)
    OpenCircuit,
    /// Thermocouple shorted to ground or supply
    ShortCircuit,
    /// Reading out of the converter's range
    OutOfRange,
    /// Bus or conversion error (converter not responding)
    ConversionError,
}

/// Trait for temperature sensors
///
/// Implementations handle the specific converter (MAX6675, MAX31855, ...)
/// and report raw, unfiltered readings. Filtering and fault confirmation
/// happen in [`crate::sensor::ThermocoupleReader`].
pub trait TemperatureSensor {
    /// Read the current temperature in degrees Celsius
    ///
    /// Takes `&mut self` because bus reads typically require mutable access.
    fn read_celsius(&mut self) -> Result<f32, SensorError>;
}
