//! Output channels
//!
//! Logical view of the four outputs: a role fixed at configuration time and
//! a duty cycle the control loop changes every period. Nothing here touches
//! hardware; see [`super::actuator`] for that.

use crate::config::{OutputRole, MAX_DUTY_CYCLE, MAX_OUTPUTS};

/// One output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputChannel {
    pub role: OutputRole,
    /// Percent ON, 0..=100
    pub duty_cycle: u8,
}

/// All output channels
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputBank {
    channels: [OutputChannel; MAX_OUTPUTS],
}

impl OutputBank {
    /// Create a bank with every channel at 0%
    pub fn new(roles: &[OutputRole; MAX_OUTPUTS]) -> Self {
        let mut channels = [OutputChannel::default(); MAX_OUTPUTS];
        for (channel, role) in channels.iter_mut().zip(roles.iter()) {
            channel.role = *role;
        }
        Self { channels }
    }

    pub fn role(&self, index: usize) -> OutputRole {
        self.channels
            .get(index)
            .map(|c| c.role)
            .unwrap_or_default()
    }

    pub fn duty_cycle(&self, index: usize) -> u8 {
        self.channels.get(index).map(|c| c.duty_cycle).unwrap_or(0)
    }

    /// Set a channel's duty cycle, clamped to 0..=100
    ///
    /// Driving an unused channel is a caller bug; release builds ignore it.
    pub fn set_duty_cycle(&mut self, index: usize, percent: u8) {
        let Some(channel) = self.channels.get_mut(index) else {
            debug_assert!(false, "output index {} out of range", index);
            return;
        };
        if channel.role == OutputRole::Unused {
            debug_assert!(percent == 0, "duty cycle set on unused output {}", index);
            return;
        }
        channel.duty_cycle = percent.min(MAX_DUTY_CYCLE);
    }

    /// Set every channel with a given role
    pub fn set_role_duty_cycle(&mut self, role: OutputRole, percent: u8) {
        if role == OutputRole::Unused {
            return;
        }
        for channel in self.channels.iter_mut().filter(|c| c.role == role) {
            channel.duty_cycle = percent.min(MAX_DUTY_CYCLE);
        }
    }

    /// Turn every heating channel off
    pub fn heating_off(&mut self) {
        for channel in self
            .channels
            .iter_mut()
            .filter(|c| c.role.is_heating_element())
        {
            channel.duty_cycle = 0;
        }
    }

    /// Turn every channel off
    pub fn all_off(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.duty_cycle = 0;
        }
    }

    /// Check whether any heating channel has a non-zero duty cycle
    pub fn is_heating(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.role.is_heating_element() && c.duty_cycle > 0)
    }

    pub fn channels(&self) -> &[OutputChannel; MAX_OUTPUTS] {
        &self.channels
    }
}
