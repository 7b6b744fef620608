//! Per-run bookkeeping
//!
//! Timestamps, the recent temperature history used for rate estimation,
//! and progress within the current phase.

use heapless::HistoryBuffer;

use crate::config::Mode;

/// Samples kept for rate-of-change estimation
pub const HISTORY_LEN: usize = 8;

/// Progress within the current phase, reset on every transition
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseProgress {
    /// When the phase target was first reached
    pub reached_at_ms: Option<u64>,
    /// Start of the current sag below the hold band
    pub below_since_ms: Option<u64>,
    /// Regulator latch: heating elements enabled
    pub heat_enabled: bool,
    /// Highest temperature seen in the phase
    pub peak_c: Option<f32>,
}

impl Default for PhaseProgress {
    fn default() -> Self {
        Self {
            reached_at_ms: None,
            below_since_ms: None,
            heat_enabled: true,
            peak_c: None,
        }
    }
}

/// State of one run, created at start and dropped when it ends
#[derive(Debug, Clone)]
pub struct RunState {
    pub mode: Mode,
    /// Index of the current phase in the profile
    pub phase_index: usize,
    pub phase_start_ms: u64,
    pub process_start_ms: u64,
    pub last_temperature_c: Option<f32>,
    history: HistoryBuffer<(u64, f32), HISTORY_LEN>,
    pub progress: PhaseProgress,
}

impl RunState {
    pub fn new(mode: Mode, now_ms: u64) -> Self {
        Self {
            mode,
            phase_index: 0,
            phase_start_ms: now_ms,
            process_start_ms: now_ms,
            last_temperature_c: None,
            history: HistoryBuffer::new(),
            progress: PhaseProgress::default(),
        }
    }

    /// Record a filtered temperature sample
    pub fn record(&mut self, now_ms: u64, temperature_c: f32) {
        self.last_temperature_c = Some(temperature_c);
        self.history.write((now_ms, temperature_c));
        let peak = self.progress.peak_c.get_or_insert(temperature_c);
        if temperature_c > *peak {
            *peak = temperature_c;
        }
    }

    /// Rate of change over the history window (°C/s)
    pub fn rate_c_per_s(&self) -> Option<f32> {
        let &(first_ms, first_c) = self.history.oldest_ordered().next()?;
        let &(last_ms, last_c) = self.history.recent()?;
        if last_ms <= first_ms {
            return None;
        }
        Some((last_c - first_c) * 1000.0 / (last_ms - first_ms) as f32)
    }

    /// Move to the phase at `index`
    pub fn enter_phase(&mut self, index: usize, now_ms: u64) {
        self.phase_index = index;
        self.phase_start_ms = now_ms;
        self.progress = PhaseProgress::default();
    }

    pub fn phase_elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.phase_start_ms)
    }

    pub fn phase_elapsed_s(&self, now_ms: u64) -> u32 {
        (self.phase_elapsed_ms(now_ms) / 1000) as u32
    }

    pub fn run_elapsed_s(&self, now_ms: u64) -> u32 {
        (now_ms.saturating_sub(self.process_start_ms) / 1000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_needs_two_samples() {
        let mut run = RunState::new(Mode::Reflow, 0);
        assert_eq!(run.rate_c_per_s(), None);
        run.record(0, 25.0);
        assert_eq!(run.rate_c_per_s(), None);
        run.record(1000, 27.0);
        assert_eq!(run.rate_c_per_s(), Some(2.0));
    }

    #[test]
    fn test_rate_over_window() {
        let mut run = RunState::new(Mode::Reflow, 0);
        for second in 0..20u64 {
            run.record(second * 1000, 100.0 - second as f32);
        }
        // Window is the last HISTORY_LEN samples
        assert_eq!(run.rate_c_per_s(), Some(-1.0));
    }

    #[test]
    fn test_enter_phase_resets_progress() {
        let mut run = RunState::new(Mode::Reflow, 1000);
        run.record(1500, 30.0);
        run.progress.reached_at_ms = Some(1500);
        run.progress.heat_enabled = false;

        run.enter_phase(1, 2000);
        assert_eq!(run.phase_index, 1);
        assert_eq!(run.progress, PhaseProgress::default());
        assert_eq!(run.phase_elapsed_s(5000), 3);
        assert_eq!(run.run_elapsed_s(5000), 4);
        // History survives the transition
        assert_eq!(run.last_temperature_c, Some(30.0));
    }
}
