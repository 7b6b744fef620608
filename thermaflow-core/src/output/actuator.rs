//! Duty-cycle actuator
//!
//! Turns per-channel duty cycles into ON/OFF states. The control period is
//! split into slots; a channel at `d`% is ON for `round(d * slots / 100)`
//! consecutive slots starting at its offset. Heating channels get evenly
//! spread offsets so their ON edges never coincide, and at most
//! `max_simultaneous` heating channels are ON in any slot.

use super::channel::OutputBank;
use crate::config::{OutputRole, MAX_OUTPUTS};
use crate::traits::OutputDriver;

/// Slotted ON/OFF scheduler for the output channels
#[derive(Debug, Clone)]
pub struct DutyCycleActuator {
    roles: [OutputRole; MAX_OUTPUTS],
    slots: u8,
    max_simultaneous: u8,
    /// First ON slot of each channel
    offsets: [u8; MAX_OUTPUTS],
    /// ON slots per period for each channel
    on_slots: [u8; MAX_OUTPUTS],
}

impl DutyCycleActuator {
    /// Create an actuator with every channel OFF
    ///
    /// `slots` and `max_simultaneous` are clamped to at least 1.
    pub fn new(roles: &[OutputRole; MAX_OUTPUTS], slots: u8, max_simultaneous: u8) -> Self {
        let slots = slots.max(1);
        let heaters = roles.iter().filter(|r| r.is_heating_element()).count();

        let mut offsets = [0; MAX_OUTPUTS];
        let mut k = 0;
        for (offset, role) in offsets.iter_mut().zip(roles.iter()) {
            if role.is_heating_element() {
                *offset = (k * slots as usize / heaters) as u8;
                k += 1;
            }
        }

        Self {
            roles: *roles,
            slots,
            max_simultaneous: max_simultaneous.max(1),
            offsets,
            on_slots: [0; MAX_OUTPUTS],
        }
    }

    /// Slots per control period
    pub fn slots(&self) -> u8 {
        self.slots
    }

    pub fn offset(&self, index: usize) -> u8 {
        self.offsets.get(index).copied().unwrap_or(0)
    }

    /// Take the duty cycles for the next control period
    pub fn load(&mut self, bank: &OutputBank) {
        let slots = self.slots as u16;
        for (index, on) in self.on_slots.iter_mut().enumerate() {
            let duty = bank.duty_cycle(index) as u16;
            *on = ((duty * slots + 50) / 100) as u8;
        }
    }

    fn scheduled(&self, index: usize, slot: u8) -> bool {
        let on = self.on_slots[index];
        if on == 0 {
            return false;
        }
        if on >= self.slots {
            return true;
        }
        let relative = (slot as u16 + self.slots as u16 - self.offsets[index] as u16)
            % self.slots as u16;
        relative < on as u16
    }

    /// ON/OFF state of every channel for a slot
    ///
    /// When more heating channels are due than the cap allows, the lower
    /// output indices win.
    pub fn states(&self, slot: u8) -> [bool; MAX_OUTPUTS] {
        let slot = slot % self.slots;
        let mut states = [false; MAX_OUTPUTS];
        let mut heaters_on = 0u8;

        for (index, state) in states.iter_mut().enumerate() {
            let role = self.roles[index];
            if role == OutputRole::Unused || !self.scheduled(index, slot) {
                continue;
            }
            if role.is_heating_element() {
                if heaters_on >= self.max_simultaneous {
                    trace!("Output {} held off in slot {}", index, slot);
                    continue;
                }
                heaters_on += 1;
            }
            *state = true;
        }

        states
    }

    /// Write the states for a slot to the physical outputs
    pub fn drive<O: OutputDriver>(&self, slot: u8, outputs: &mut O) {
        for (index, on) in self.states(slot).iter().enumerate() {
            outputs.set_output(index, *on);
        }
    }

    /// Turn every output off now and forget the loaded duty cycles
    pub fn force_off<O: OutputDriver>(&mut self, outputs: &mut O) {
        self.on_slots = [0; MAX_OUTPUTS];
        for index in 0..MAX_OUTPUTS {
            outputs.set_output(index, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROLES: [OutputRole; MAX_OUTPUTS] = [
        OutputRole::TopElement,
        OutputRole::BottomElement,
        OutputRole::BoostElement,
        OutputRole::ConvectionFan,
    ];

    struct MockOutputs {
        on: [bool; MAX_OUTPUTS],
    }

    impl OutputDriver for MockOutputs {
        fn set_output(&mut self, index: usize, on: bool) {
            self.on[index] = on;
        }

        fn is_on(&self, index: usize) -> bool {
            self.on[index]
        }
    }

    fn loaded(duties: [u8; MAX_OUTPUTS], max_simultaneous: u8) -> DutyCycleActuator {
        let mut bank = OutputBank::new(&ROLES);
        for (index, duty) in duties.iter().enumerate() {
            bank.set_duty_cycle(index, *duty);
        }
        let mut actuator = DutyCycleActuator::new(&ROLES, 50, max_simultaneous);
        actuator.load(&bank);
        actuator
    }

    fn on_count(actuator: &DutyCycleActuator, index: usize) -> usize {
        (0..actuator.slots())
            .filter(|slot| actuator.states(*slot)[index])
            .count()
    }

    #[test]
    fn test_offsets_spread() {
        let actuator = DutyCycleActuator::new(&ROLES, 50, 2);
        assert_eq!(actuator.offset(0), 0);
        assert_eq!(actuator.offset(1), 16);
        assert_eq!(actuator.offset(2), 33);
        assert_eq!(actuator.offset(3), 0);
    }

    #[test]
    fn test_on_slots_rounded() {
        let actuator = loaded([50, 0, 0, 100], 4);
        assert_eq!(on_count(&actuator, 0), 25);
        assert_eq!(on_count(&actuator, 1), 0);
        assert_eq!(on_count(&actuator, 3), 50);

        // 1% of 50 slots rounds to 1 slot, 0.5 rounds up
        let actuator = loaded([1, 3, 0, 0], 4);
        assert_eq!(on_count(&actuator, 0), 1);
        assert_eq!(on_count(&actuator, 1), 2);
    }

    #[test]
    fn test_on_window_wraps() {
        let actuator = loaded([0, 0, 60, 0], 4);
        // 30 slots from 33: 33..50 then 0..13
        assert!(actuator.states(33)[2]);
        assert!(actuator.states(49)[2]);
        assert!(actuator.states(12)[2]);
        assert!(!actuator.states(13)[2]);
        assert!(!actuator.states(32)[2]);
    }

    #[test]
    fn test_cap_holds_lowest_priority_off() {
        let actuator = loaded([80, 100, 60, 100], 2);
        // Slot 5: top, bottom and boost all due
        let states = actuator.states(5);
        assert!(states[0]);
        assert!(states[1]);
        assert!(!states[2]);
        // Fans do not count toward the cap
        assert!(states[3]);
    }

    #[test]
    fn test_drive_and_force_off() {
        let mut actuator = loaded([100, 100, 0, 100], 2);
        let mut outputs = MockOutputs { on: [false; MAX_OUTPUTS] };

        actuator.drive(0, &mut outputs);
        assert_eq!(outputs.on, [true, true, false, true]);

        actuator.force_off(&mut outputs);
        assert_eq!(outputs.on, [false; MAX_OUTPUTS]);
        actuator.drive(0, &mut outputs);
        assert_eq!(outputs.on, [false; MAX_OUTPUTS]);
    }

    proptest! {
        #[test]
        fn cap_never_exceeded(
            duties in proptest::array::uniform4(0u8..=100),
            max in 1u8..=3,
        ) {
            let actuator = loaded(duties, max);
            for slot in 0..actuator.slots() {
                let states = actuator.states(slot);
                let heaters = (0..3).filter(|i| states[*i]).count();
                prop_assert!(heaters <= max as usize);
            }
        }

        #[test]
        fn heating_edges_never_coincide(duties in proptest::array::uniform3(1u8..=99)) {
            let actuator = loaded([duties[0], duties[1], duties[2], 0], 3);
            for slot in 0..actuator.slots() {
                let previous = actuator.states((slot + actuator.slots() - 1) % actuator.slots());
                let current = actuator.states(slot);
                let rising = (0..3).filter(|i| current[*i] && !previous[*i]).count();
                prop_assert!(rising <= 1);
            }
        }
    }
}
