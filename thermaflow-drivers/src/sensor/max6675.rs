//! MAX6675 K-type thermocouple converter
//!
//! The MAX6675 is read-only over SPI (mode 0, up to 4.3 MHz). Every read
//! clocks out one 16-bit frame, MSB first:
//!
//! - D15: dummy sign bit, always 0
//! - D14..D3: temperature, 12 bits at 0.25°C per LSB (0 to 1023.75°C)
//! - D2: set when the thermocouple input is open
//! - D1: device ID, always 0
//! - D0: three-state
//!
//! A conversion takes up to 220 ms; reading faster returns the previous
//! result, so the sampler should not poll more often than that.

use embedded_hal::spi::SpiDevice;
use thermaflow_core::traits::{SensorError, TemperatureSensor};

/// Degrees per LSB of the temperature field
const DEGREES_PER_LSB: f32 = 0.25;

/// Frame bit flagging an open thermocouple
const OPEN_CIRCUIT_BIT: u16 = 1 << 2;

/// Dummy sign bit; reads 0 on a working converter
const SIGN_BIT: u16 = 1 << 15;

/// Minimum interval between conversions (ms)
pub const CONVERSION_TIME_MS: u32 = 220;

/// Decode a raw MAX6675 frame
///
/// A set sign bit means the bus is floating (converter missing or MISO
/// stuck high), which is reported as a conversion error rather than a
/// temperature.
pub fn decode_frame(frame: u16) -> Result<f32, SensorError> {
    if frame & SIGN_BIT != 0 {
        return Err(SensorError::ConversionError);
    }
    if frame & OPEN_CIRCUIT_BIT != 0 {
        return Err(SensorError::OpenCircuit);
    }

    let counts = (frame >> 3) & 0x0FFF;
    Ok(counts as f32 * DEGREES_PER_LSB)
}

/// MAX6675 on an SPI device
pub struct Max6675<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max6675<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Read one raw frame
    pub fn read_frame(&mut self) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.spi
            .read(&mut buf)
            .map_err(|_| SensorError::ConversionError)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> TemperatureSensor for Max6675<SPI> {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        decode_frame(self.read_frame()?)
    }
}
