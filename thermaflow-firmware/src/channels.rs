//! Inter-task communication channels
//!
//! Defines the statics shared between Embassy tasks. Uses embassy-sync
//! primitives for async hand-off and a portable atomic for the sample
//! slot, which the control loop polls without awaiting.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU64, Ordering};

use thermaflow_core::state::Command;
use thermaflow_core::traits::SensorError;
use thermaflow_core::OvenStatus;
use thermaflow_drivers::settings::MirroredSettings;

/// Channel capacity for operator commands
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Operator commands from the input layer
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Latest oven status for the display layer (updated every control period)
pub static STATUS: Signal<CriticalSectionRawMutex, OvenStatus> = Signal::new();

/// Signal that the settings mirror has unsaved writes
pub static SETTINGS_FLUSH: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// RAM image of the persisted settings
///
/// The control loop reads and writes it synchronously; the persistence
/// task drains dirty keys into flash.
pub static SETTINGS: Mutex<CriticalSectionRawMutex, RefCell<MirroredSettings>> =
    Mutex::new(RefCell::new(MirroredSettings::new()));

/// Latest thermocouple sample (written by the sampler task)
pub static SAMPLE: SampleSlot = SampleSlot::new();

/// Single-writer, single-reader slot for the latest sample
///
/// Packs a status tag into the high word and the f32 bits into the low
/// word, so a sample is published in one atomic store.
pub struct SampleSlot(AtomicU64);

/// Tag of an empty slot
const TAG_EMPTY: u32 = 0;
const TAG_OK: u32 = 1;
const TAG_OPEN: u32 = 2;
const TAG_SHORT: u32 = 3;
const TAG_RANGE: u32 = 4;
const TAG_CONVERSION: u32 = 5;

impl SampleSlot {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Publish a reading, replacing any unread one
    pub fn publish(&self, reading: Result<f32, SensorError>) {
        let (tag, bits) = match reading {
            Ok(temperature_c) => (TAG_OK, temperature_c.to_bits()),
            Err(SensorError::OpenCircuit) => (TAG_OPEN, 0),
            Err(SensorError::ShortCircuit) => (TAG_SHORT, 0),
            Err(SensorError::OutOfRange) => (TAG_RANGE, 0),
            Err(SensorError::ConversionError) => (TAG_CONVERSION, 0),
        };
        self.0
            .store(((tag as u64) << 32) | bits as u64, Ordering::Release);
    }

    /// Take the latest reading, or None if nothing new was published
    pub fn take(&self) -> Option<Result<f32, SensorError>> {
        let packed = self.0.swap(0, Ordering::Acquire);
        let bits = packed as u32;
        match (packed >> 32) as u32 {
            TAG_EMPTY => None,
            TAG_OK => Some(Ok(f32::from_bits(bits))),
            TAG_OPEN => Some(Err(SensorError::OpenCircuit)),
            TAG_SHORT => Some(Err(SensorError::ShortCircuit)),
            TAG_RANGE => Some(Err(SensorError::OutOfRange)),
            _ => Some(Err(SensorError::ConversionError)),
        }
    }
}
