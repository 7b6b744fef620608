//! Phase state machine
//!
//! Walks a [`Profile`] forward one phase at a time. Each evaluation checks
//! the current phase's [`TransitionRule`] against the latest reading and
//! either stays, advances, finishes the run or aborts it. There is no way
//! back to an earlier phase; the only other exit is Abort.

use super::events::{AdvanceReason, Fault};
use super::run::RunState;
use crate::profile::{PhaseDefinition, PhaseId, Profile, TransitionRule};
use crate::sensor::SensorFault;

/// Summary of a phase that just ended
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompletedPhase {
    pub id: PhaseId,
    /// Time spent in the phase
    pub elapsed_s: u32,
    /// Time from phase start until the target was reached, or until the
    /// ramp gave up; `None` for phases without a target
    pub time_to_target_s: Option<u32>,
    pub reason: AdvanceReason,
}

/// Result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Stay,
    Advanced {
        completed: CompletedPhase,
        next: PhaseId,
    },
    /// The last phase completed
    Finished { completed: CompletedPhase },
    Aborted(Fault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    Finished,
    Aborted,
}

/// Rule verdict for the current phase
enum Verdict {
    Hold,
    Advance(AdvanceReason),
    Abort(Fault),
}

/// Runs one profile from Init to its last phase
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    profile: Profile,
    run: RunState,
    status: Status,
}

impl PhaseMachine {
    /// Start a run at the first phase of `profile`
    pub fn start(profile: Profile, now_ms: u64) -> Self {
        let run = RunState::new(profile.mode(), now_ms);
        let status = if profile.is_empty() {
            Status::Finished
        } else {
            Status::Running
        };

        Self {
            profile,
            run,
            status,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn run_mut(&mut self) -> &mut RunState {
        &mut self.run
    }

    /// Definition of the active phase, `None` once the run is over
    pub fn current(&self) -> Option<&PhaseDefinition> {
        match self.status {
            Status::Running => self.profile.phase(self.run.phase_index),
            _ => None,
        }
    }

    /// Id of the current phase; Abort after an abort, the last phase
    /// after the run finished
    pub fn phase_id(&self) -> PhaseId {
        match self.status {
            Status::Aborted => PhaseId::Abort,
            _ => self
                .profile
                .phase(self.run.phase_index)
                .map(|p| p.id)
                .unwrap_or(PhaseId::Init),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn is_aborted(&self) -> bool {
        self.status == Status::Aborted
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }

    /// Check whether the current phase has reached its target
    pub fn target_reached(&self) -> bool {
        self.run.progress.reached_at_ms.is_some()
    }

    /// Jump to Abort; a no-op once the run is over
    pub fn abort(&mut self, now_ms: u64) {
        if self.status != Status::Running {
            return;
        }
        self.status = Status::Aborted;
        self.run.phase_start_ms = now_ms;
    }

    /// Evaluate the current phase against a reading
    pub fn evaluate(&mut self, now_ms: u64, reading: Result<f32, SensorFault>) -> Step {
        let Some(phase) = self.current().copied() else {
            return Step::Stay;
        };

        if let Ok(temperature_c) = reading {
            self.run.record(now_ms, temperature_c);
        }

        match self.check(&phase, now_ms, reading) {
            Verdict::Hold => Step::Stay,
            Verdict::Abort(fault) => {
                error!("{} aborted: {}", phase.id, fault);
                self.abort(now_ms);
                Step::Aborted(fault)
            }
            Verdict::Advance(reason) => {
                let completed = self.complete(&phase, now_ms, reason);
                let next_index = self.run.phase_index + 1;
                match self.profile.phase(next_index).map(|p| p.id) {
                    Some(next) => {
                        info!(
                            "{} -> {} after {}s ({})",
                            phase.id, next, completed.elapsed_s, reason
                        );
                        self.run.enter_phase(next_index, now_ms);
                        Step::Advanced { completed, next }
                    }
                    None => {
                        info!("{} complete, run finished", phase.id);
                        self.status = Status::Finished;
                        Step::Finished { completed }
                    }
                }
            }
        }
    }

    fn complete(
        &self,
        phase: &PhaseDefinition,
        now_ms: u64,
        reason: AdvanceReason,
    ) -> CompletedPhase {
        let elapsed_s = self.run.phase_elapsed_s(now_ms);
        let time_to_target_s = match reason {
            AdvanceReason::TargetReached | AdvanceReason::TimedOut { .. } => Some(elapsed_s),
            AdvanceReason::DwellComplete => self
                .run
                .progress
                .reached_at_ms
                .map(|at| (at.saturating_sub(self.run.phase_start_ms) / 1000) as u32),
            _ => None,
        };

        CompletedPhase {
            id: phase.id,
            elapsed_s,
            time_to_target_s,
            reason,
        }
    }

    fn check(
        &mut self,
        phase: &PhaseDefinition,
        now_ms: u64,
        reading: Result<f32, SensorFault>,
    ) -> Verdict {
        let elapsed_ms = self.run.phase_elapsed_ms(now_ms);
        let timed_out = phase
            .max_duration_s
            .is_some_and(|max_s| elapsed_ms >= max_s as u64 * 1000);
        // Phases without a target count as already there
        let target_c = phase.target_c.unwrap_or(f32::NEG_INFINITY);

        match phase.rule {
            TransitionRule::StartCheck { max_start_c } => match reading {
                Ok(t) if t < max_start_c => Verdict::Advance(AdvanceReason::StartChecked),
                Ok(t) => Verdict::Abort(Fault::UnsafeStartTemperature { temperature_c: t }),
                Err(fault) if fault.is_fatal() => Verdict::Abort(Fault::Sensor(fault)),
                Err(fault) if timed_out => Verdict::Abort(Fault::Sensor(fault)),
                Err(_) => Verdict::Hold,
            },

            TransitionRule::Ramp {
                tolerance_c,
                max_shortfall_c,
            } => {
                if reading.is_ok_and(|t| t >= target_c - tolerance_c) {
                    self.run.progress.reached_at_ms = Some(now_ms);
                    return Verdict::Advance(AdvanceReason::TargetReached);
                }
                if !timed_out {
                    return Verdict::Hold;
                }
                match reading {
                    Ok(t) => {
                        let shortfall_c = target_c - t;
                        if shortfall_c > max_shortfall_c {
                            Verdict::Abort(Fault::TimingOverrun { phase: phase.id })
                        } else {
                            warn!("{} missed target by {}C", phase.id, shortfall_c);
                            Verdict::Advance(AdvanceReason::TimedOut { shortfall_c })
                        }
                    }
                    Err(fault) => Verdict::Abort(Fault::Sensor(fault)),
                }
            }

            TransitionRule::Hold {
                dwell_s,
                drop_c,
                grace_s,
            } => {
                if timed_out {
                    return Verdict::Abort(Fault::TimingOverrun { phase: phase.id });
                }
                let Ok(t) = reading else {
                    return Verdict::Hold;
                };

                let progress = &mut self.run.progress;
                if progress.reached_at_ms.is_none() && t >= target_c {
                    debug!("{} reached {}C", phase.id, t);
                    progress.reached_at_ms = Some(now_ms);
                }
                let Some(reached_at_ms) = progress.reached_at_ms else {
                    return Verdict::Hold;
                };

                if t < target_c - drop_c {
                    let since = *progress.below_since_ms.get_or_insert(now_ms);
                    if now_ms.saturating_sub(since) > grace_s as u64 * 1000 {
                        return Verdict::Abort(Fault::TargetNotSustained { phase: phase.id });
                    }
                } else {
                    progress.below_since_ms = None;
                }

                if now_ms.saturating_sub(reached_at_ms) >= dwell_s as u64 * 1000 {
                    Verdict::Advance(AdvanceReason::DwellComplete)
                } else {
                    Verdict::Hold
                }
            }

            TransitionRule::Timed => {
                if timed_out {
                    Verdict::Advance(AdvanceReason::DurationElapsed)
                } else {
                    Verdict::Hold
                }
            }

            TransitionRule::Immediate => Verdict::Advance(AdvanceReason::Immediate),

            TransitionRule::CoolBelow { threshold_c } => match reading {
                Ok(t) if t < threshold_c => Verdict::Advance(AdvanceReason::CooledBelow),
                _ => Verdict::Hold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlTuning, OvenConfig};

    fn reflow() -> PhaseMachine {
        let profile = Profile::reflow(&OvenConfig::default(), &ControlTuning::default());
        PhaseMachine::start(profile, 0)
    }

    /// Reflow machine already in Presoak, phase started at t=0
    fn in_presoak() -> PhaseMachine {
        let mut machine = reflow();
        let step = machine.evaluate(0, Ok(25.0));
        assert!(matches!(
            step,
            Step::Advanced {
                next: PhaseId::Presoak,
                ..
            }
        ));
        machine
    }

    fn advance_to(machine: &mut PhaseMachine, id: PhaseId, now_ms: u64) {
        let index = machine.profile().position(id).unwrap();
        machine.run_mut().enter_phase(index, now_ms);
    }

    #[test]
    fn test_starts_in_init() {
        let machine = reflow();
        assert_eq!(machine.phase_id(), PhaseId::Init);
        assert!(machine.is_running());
    }

    #[test]
    fn test_init_rejects_hot_oven() {
        let mut machine = reflow();
        assert_eq!(
            machine.evaluate(0, Ok(60.0)),
            Step::Aborted(Fault::UnsafeStartTemperature { temperature_c: 60.0 })
        );
        assert_eq!(machine.phase_id(), PhaseId::Abort);
    }

    #[test]
    fn test_init_waits_for_reading() {
        let mut machine = reflow();
        assert_eq!(machine.evaluate(0, Err(SensorFault::NoReading)), Step::Stay);
        assert_eq!(machine.evaluate(9000, Err(SensorFault::NoReading)), Step::Stay);
        assert_eq!(
            machine.evaluate(10_000, Err(SensorFault::NoReading)),
            Step::Aborted(Fault::Sensor(SensorFault::NoReading))
        );
    }

    #[test]
    fn test_init_sensor_fault() {
        let mut machine = reflow();
        assert_eq!(
            machine.evaluate(0, Err(SensorFault::OpenCircuit)),
            Step::Aborted(Fault::Sensor(SensorFault::OpenCircuit))
        );
    }

    #[test]
    fn test_presoak_advances_when_reached() {
        let mut machine = in_presoak();
        for second in 1..60u64 {
            let t = 25.0 + second as f32 * 2.0;
            assert_eq!(machine.evaluate(second * 1000, Ok(t)), Step::Stay);
        }
        match machine.evaluate(60_000, Ok(150.0)) {
            Step::Advanced { completed, next } => {
                assert_eq!(next, PhaseId::Soak);
                assert_eq!(completed.id, PhaseId::Presoak);
                assert_eq!(completed.elapsed_s, 60);
                assert_eq!(completed.time_to_target_s, Some(60));
                assert_eq!(completed.reason, AdvanceReason::TargetReached);
            }
            step => panic!("unexpected {:?}", step),
        }
    }

    #[test]
    fn test_temperature_wins_over_timeout() {
        let mut machine = in_presoak();
        match machine.evaluate(90_000, Ok(149.6)) {
            Step::Advanced { completed, .. } => {
                assert_eq!(completed.reason, AdvanceReason::TargetReached)
            }
            step => panic!("unexpected {:?}", step),
        }
    }

    #[test]
    fn test_ramp_timeout_continues_when_close() {
        let mut machine = in_presoak();
        match machine.evaluate(90_000, Ok(140.0)) {
            Step::Advanced { completed, next } => {
                assert_eq!(next, PhaseId::Soak);
                assert_eq!(
                    completed.reason,
                    AdvanceReason::TimedOut { shortfall_c: 10.0 }
                );
                assert_eq!(completed.time_to_target_s, Some(90));
            }
            step => panic!("unexpected {:?}", step),
        }
    }

    #[test]
    fn test_ramp_timeout_aborts_when_far() {
        let mut machine = in_presoak();
        assert_eq!(
            machine.evaluate(90_000, Ok(100.0)),
            Step::Aborted(Fault::TimingOverrun {
                phase: PhaseId::Presoak
            })
        );
        assert!(machine.is_aborted());
        // Nothing happens after an abort
        assert_eq!(machine.evaluate(91_000, Ok(100.0)), Step::Stay);
    }

    #[test]
    fn test_reflow_hold_dwell() {
        let mut machine = reflow();
        advance_to(&mut machine, PhaseId::Reflow, 0);

        assert_eq!(machine.evaluate(10_000, Ok(230.0)), Step::Stay);
        assert_eq!(machine.evaluate(20_000, Ok(240.0)), Step::Stay);
        assert!(machine.target_reached());
        assert_eq!(machine.evaluate(34_000, Ok(239.5)), Step::Stay);

        match machine.evaluate(35_000, Ok(239.5)) {
            Step::Advanced { completed, next } => {
                assert_eq!(next, PhaseId::Waiting);
                assert_eq!(completed.reason, AdvanceReason::DwellComplete);
                assert_eq!(completed.time_to_target_s, Some(20));
                assert_eq!(completed.elapsed_s, 35);
            }
            step => panic!("unexpected {:?}", step),
        }
    }

    #[test]
    fn test_reflow_sag_aborts_after_grace() {
        let mut machine = reflow();
        advance_to(&mut machine, PhaseId::Reflow, 0);
        assert_eq!(machine.evaluate(20_000, Ok(240.0)), Step::Stay);

        // 2C below target: within grace for 10s
        for second in 21..=31u64 {
            assert_eq!(machine.evaluate(second * 1000, Ok(238.0)), Step::Stay);
        }
        assert_eq!(
            machine.evaluate(32_000, Ok(238.0)),
            Step::Aborted(Fault::TargetNotSustained {
                phase: PhaseId::Reflow
            })
        );
    }

    #[test]
    fn test_brief_sag_tolerated() {
        let mut machine = reflow();
        advance_to(&mut machine, PhaseId::Reflow, 0);
        machine.evaluate(20_000, Ok(240.0));
        for second in 21..=25u64 {
            assert_eq!(machine.evaluate(second * 1000, Ok(238.0)), Step::Stay);
        }
        assert_eq!(machine.evaluate(26_000, Ok(240.0)), Step::Stay);
        assert_eq!(machine.run().progress.below_since_ms, None);
    }

    #[test]
    fn test_hold_timeout_beats_dwell() {
        let mut machine = reflow();
        advance_to(&mut machine, PhaseId::Reflow, 0);
        machine.evaluate(170_000, Ok(240.0));
        assert_eq!(
            machine.evaluate(180_000, Ok(240.0)),
            Step::Aborted(Fault::TimingOverrun {
                phase: PhaseId::Reflow
            })
        );
    }

    #[test]
    fn test_waiting_and_cooling() {
        let mut machine = reflow();
        advance_to(&mut machine, PhaseId::Waiting, 0);
        assert_eq!(machine.evaluate(19_000, Ok(230.0)), Step::Stay);
        assert!(matches!(
            machine.evaluate(20_000, Ok(228.0)),
            Step::Advanced {
                next: PhaseId::CoolingBoardsIn,
                ..
            }
        ));

        assert_eq!(machine.evaluate(60_000, Ok(100.0)), Step::Stay);
        assert!(matches!(
            machine.evaluate(61_000, Ok(99.5)),
            Step::Advanced {
                next: PhaseId::CoolingBoardsOut,
                ..
            }
        ));

        assert_eq!(machine.evaluate(120_000, Ok(50.0)), Step::Stay);
        assert!(matches!(
            machine.evaluate(121_000, Ok(49.0)),
            Step::Finished { .. }
        ));
        assert!(machine.is_finished());
        assert_eq!(machine.phase_id(), PhaseId::CoolingBoardsOut);
    }

    #[test]
    fn test_operator_abort() {
        let mut machine = in_presoak();
        machine.abort(5000);
        assert_eq!(machine.phase_id(), PhaseId::Abort);
        assert!(machine.current().is_none());
        assert_eq!(machine.evaluate(6000, Ok(50.0)), Step::Stay);
    }
}
