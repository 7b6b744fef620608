//! GPIO output stage
//!
//! Drives the SSRs and fan relays from GPIO pins, directly or through a
//! transistor. Each pin can be active-high or active-low.

use embedded_hal::digital::{OutputPin, PinState};
use thermaflow_core::config::MAX_OUTPUTS;
use thermaflow_core::traits::OutputDriver;

/// Bank of GPIO-driven outputs
///
/// Logical index `i` maps to `pins[i]`. Pin errors are counted rather
/// than propagated, since the duty-cycle actuator runs in a tight slot
/// loop with nowhere to send them.
pub struct GpioOutputs<P> {
    pins: [P; MAX_OUTPUTS],
    /// If true, output ON = pin LOW
    inverted: [bool; MAX_OUTPUTS],
    /// Logical states (true = output on)
    states: [bool; MAX_OUTPUTS],
    errors: u32,
}

impl<P: OutputPin> GpioOutputs<P> {
    /// Create the bank with every output off
    ///
    /// # Arguments
    /// - `pins`: One pin per output channel
    /// - `inverted`: Per-pin polarity; true for active-low drivers
    pub fn new(pins: [P; MAX_OUTPUTS], inverted: [bool; MAX_OUTPUTS]) -> Self {
        let mut outputs = Self {
            pins,
            inverted,
            states: [false; MAX_OUTPUTS],
            errors: 0,
        };
        for index in 0..MAX_OUTPUTS {
            outputs.set_output(index, false);
        }
        outputs
    }

    /// Create the bank with every pin active-high
    pub fn new_active_high(pins: [P; MAX_OUTPUTS]) -> Self {
        Self::new(pins, [false; MAX_OUTPUTS])
    }

    /// Number of failed pin writes since creation
    pub fn errors(&self) -> u32 {
        self.errors
    }
}

impl<P: OutputPin> OutputDriver for GpioOutputs<P> {
    fn set_output(&mut self, index: usize, on: bool) {
        let (Some(pin), Some(state)) = (self.pins.get_mut(index), self.states.get_mut(index)) else {
            return;
        };
        *state = on;

        // Normal: on=true, inverted=false → high
        // Inverted: on=true, inverted=true → low
        let level = PinState::from(on != self.inverted[index]);
        if pin.set_state(level).is_err() {
            self.errors = self.errors.saturating_add(1);
        }
    }

    fn is_on(&self, index: usize) -> bool {
        self.states.get(index).copied().unwrap_or(false)
    }
}
