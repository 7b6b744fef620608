//! Adaptive duty-cycle learning
//!
//! After each learned phase the time the oven took to reach the phase
//! target is compared with the ideal. Too slow raises the duty cycle of
//! every heating element in that phase, too fast lowers it. Adjustments are
//! always computed from the snapshot loaded at run start, so repeating an
//! observation never compounds.

use crate::config::{
    is_learned, LearnedPhase, LearnedSettings, LearningTuning, OutputRole, SettingId,
    MAX_DUTY_CYCLE, MAX_OUTPUTS,
};
use crate::traits::SettingsStore;

/// How far a phase was from its ideal duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrajectoryError {
    pub actual_s: u32,
    pub ideal_s: u32,
}

impl TrajectoryError {
    /// Relative error, positive when the phase was too slow
    pub fn ratio(self) -> f32 {
        if self.ideal_s == 0 {
            return 0.0;
        }
        (self.actual_s as f32 - self.ideal_s as f32) / self.ideal_s as f32
    }
}

/// Round half away from zero (`f32::round` needs std)
fn round_half_away(value: f32) -> i32 {
    if value < 0.0 {
        -((-value + 0.5) as i32)
    } else {
        (value + 0.5) as i32
    }
}

/// Learning engine for one run
#[derive(Debug, Clone)]
pub struct LearningEngine {
    snapshot: LearnedSettings,
    roles: [OutputRole; MAX_OUTPUTS],
    tuning: LearningTuning,
    /// Per learned phase: `Some(converged)` once observed this run
    results: [Option<bool>; 3],
    /// A learned value could not be written
    write_failed: bool,
}

impl LearningEngine {
    pub fn new(
        snapshot: LearnedSettings,
        roles: &[OutputRole; MAX_OUTPUTS],
        tuning: LearningTuning,
    ) -> Self {
        Self {
            snapshot,
            roles: *roles,
            tuning,
            results: [None; 3],
            write_failed: false,
        }
    }

    /// Duty cycles in effect for this run
    pub fn snapshot(&self) -> &LearnedSettings {
        &self.snapshot
    }

    pub fn learning_mode(&self) -> bool {
        self.snapshot.learning_mode
    }

    /// Adjusted duty cycle for one output, `None` if it is not learned
    pub fn observe(
        &self,
        phase: LearnedPhase,
        output: usize,
        error: TrajectoryError,
    ) -> Option<u8> {
        let role = *self.roles.get(output)?;
        if !is_learned(phase, role) {
            return None;
        }

        let max_step = self.tuning.max_step as i32;
        let step = round_half_away(error.ratio() * 100.0 * self.tuning.gain)
            .clamp(-max_step, max_step);
        let base = self.snapshot.duty_cycle(phase, output) as i32;

        Some((base + step).clamp(0, MAX_DUTY_CYCLE as i32) as u8)
    }

    /// Learn from a completed phase and persist the adjusted values
    ///
    /// Values are written one key at a time and only in learning mode. A
    /// failed write keeps whatever the store held for that key.
    pub fn learn_phase<S: SettingsStore>(
        &mut self,
        phase: LearnedPhase,
        error: TrajectoryError,
        store: &mut S,
    ) {
        let ratio = error.ratio();
        let within = -self.tuning.converged_band <= ratio && ratio <= self.tuning.converged_band;
        self.results[phase.index()] = Some(within);

        info!(
            "{} took {}s (ideal {}s)",
            phase, error.actual_s, error.ideal_s
        );

        if !self.snapshot.learning_mode {
            return;
        }

        for output in 0..MAX_OUTPUTS {
            let Some(value) = self.observe(phase, output, error) else {
                continue;
            };
            let Some(id) = SettingId::duty_cycle(phase, output) else {
                continue;
            };

            debug!(
                "{} output {}: {}% -> {}%",
                phase,
                output,
                self.snapshot.duty_cycle(phase, output),
                value
            );
            if let Err(e) = store.write(id, value) {
                warn!("Failed to store duty cycle for {} output {}: {}", phase, output, e);
                self.write_failed = true;
            }
        }
    }

    /// Check whether every learned phase was observed within the band
    pub fn converged(&self) -> bool {
        self.results.iter().all(|r| *r == Some(true))
    }

    /// Close out a run that completed normally
    ///
    /// Clears the settings-changed flag once fresh values were written for
    /// the current configuration, and leaves learning mode once every
    /// phase lands within the convergence band. Learning mode is stored
    /// before the flag is cleared so an unconverged relearn carries over.
    pub fn finish_run<S: SettingsStore>(&mut self, store: &mut S) {
        if !self.snapshot.learning_mode {
            return;
        }

        let all_observed = self.results.iter().all(|r| r.is_some());
        if self.write_failed || !all_observed {
            warn!("Learning run incomplete, keeping learning mode");
            return;
        }

        let converged = self.converged();

        if self.snapshot.settings_changed {
            // Relearning continues past this run until it converges
            if !converged {
                if let Err(e) = store.write(SettingId::LearningMode, 1) {
                    warn!("Failed to keep learning mode: {}", e);
                    return;
                }
            }
            match store.write(SettingId::SettingsChanged, 0) {
                Ok(()) => self.snapshot.settings_changed = false,
                Err(e) => {
                    warn!("Failed to clear settings-changed flag: {}", e);
                    return;
                }
            }
        }

        if converged {
            info!("All phases within band, learning complete");
            match store.write(SettingId::LearningMode, 0) {
                Ok(()) => self.snapshot.learning_mode = false,
                Err(e) => warn!("Failed to clear learning mode: {}", e),
            }
        }
    }
}
