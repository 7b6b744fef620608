//! Oven controller
//!
//! Ties the pieces together into one cooperative control loop. Each control
//! period the caller runs [`OvenController::tick`], which
//!
//! 1. feeds the raw sample through the thermocouple reader
//! 2. checks the safety monitor (a fault here zeroes heating this tick)
//! 3. evaluates the phase machine
//! 4. learns from and persists a completed phase, at boundaries only
//! 5. applies the phase's heating and fan drive to the output bank
//! 6. reloads the actuator
//!
//! and then calls [`OvenController::drive`] once per slot of the period.

use crate::config::{
    initialize_if_needed, is_learned, load_config, ControlTuning, LearnedPhase, LearnedSettings,
    Mode, OutputRole, OvenConfig, MAX_OUTPUTS,
};
use crate::learning::{LearningEngine, TrajectoryError};
use crate::output::{DutyCycleActuator, OutputBank};
use crate::profile::{HeatingDrive, PhaseDefinition, PhaseId, Profile};
use crate::safety::{SafetyMonitor, SafetyStatus};
use crate::sensor::{SensorFault, ThermocoupleReader};
use crate::state::{
    AbortCause, AdvanceReason, Command, CompletedPhase, Fault, PhaseMachine, RunEvent,
    RunState, StartError, Step,
};
use crate::traits::{OutputDriver, SensorError, SettingsStore, StoreError};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunOutcome {
    Completed(Mode),
    Aborted(AbortCause),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Snapshot for the display layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OvenStatus {
    /// Mode of the current or last run
    pub mode: Option<Mode>,
    /// Phase of the current or last run
    pub phase: Option<PhaseId>,
    pub temperature_c: Option<f32>,
    pub target_c: Option<f32>,
    pub phase_elapsed_s: u32,
    pub run_elapsed_s: u32,
    /// Active fault, including a ceiling breach while idle
    pub fault: Option<Fault>,
    /// Outcome of the last run, until acknowledged
    pub outcome: Option<RunOutcome>,
    /// Learned duty cycles are being adjusted this run
    pub learning: bool,
    /// Any heating element has a non-zero duty cycle
    pub heating: bool,
}

/// Machine plus learning state of one run
#[derive(Debug, Clone)]
struct ActiveRun {
    machine: PhaseMachine,
    learning: LearningEngine,
}

/// The oven control loop
#[derive(Debug, Clone)]
pub struct OvenController {
    config: OvenConfig,
    tuning: ControlTuning,
    reader: ThermocoupleReader,
    safety: SafetyMonitor,
    bank: OutputBank,
    actuator: DutyCycleActuator,
    run: Option<ActiveRun>,
    outcome: Option<RunOutcome>,
    fault: Option<Fault>,
}

impl OvenController {
    pub fn new(config: OvenConfig, tuning: ControlTuning) -> Self {
        Self {
            config,
            tuning,
            reader: ThermocoupleReader::new(tuning.sensor),
            safety: SafetyMonitor::new(tuning.safety_ceiling_c),
            bank: OutputBank::new(&config.roles),
            actuator: DutyCycleActuator::new(
                &config.roles,
                tuning.slots_per_period,
                tuning.max_simultaneous_heaters,
            ),
            run: None,
            outcome: None,
            fault: None,
        }
    }

    /// Initialize the store if needed and build a controller from it
    pub fn load<S: SettingsStore>(store: &mut S, tuning: ControlTuning) -> Result<Self, StoreError> {
        if initialize_if_needed(store)? {
            info!("Settings initialized with defaults");
        }
        let config = load_config(store)?;
        Ok(Self::new(config, tuning))
    }

    pub fn config(&self) -> &OvenConfig {
        &self.config
    }

    pub fn tuning(&self) -> &ControlTuning {
        &self.tuning
    }

    pub fn outputs(&self) -> &OutputBank {
        &self.bank
    }

    /// Phase machine of the current or last run
    pub fn machine(&self) -> Option<&PhaseMachine> {
        self.run.as_ref().map(|r| &r.machine)
    }

    /// Learned duty cycles in use by the current or last run
    pub fn learned(&self) -> Option<&LearnedSettings> {
        self.run.as_ref().map(|r| r.learning.snapshot())
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.machine.is_running())
    }

    /// Apply an operator command
    pub fn handle<S: SettingsStore>(
        &mut self,
        command: Command,
        now_ms: u64,
        store: &mut S,
    ) -> Result<Option<RunEvent>, StartError> {
        match command {
            Command::Start(mode) => {
                self.start(mode, now_ms, store)?;
                Ok(Some(RunEvent::Started(mode)))
            }
            Command::Abort => {
                if !self.is_running() {
                    return Ok(None);
                }
                warn!("Run aborted by operator");
                let cause = AbortCause::Operator;
                self.abort(now_ms, cause);
                Ok(Some(RunEvent::Aborted(cause)))
            }
            Command::Acknowledge => {
                self.acknowledge();
                Ok(None)
            }
        }
    }

    /// Start a run
    ///
    /// Reloads the configuration so edits made while idle take effect.
    pub fn start<S: SettingsStore>(
        &mut self,
        mode: Mode,
        now_ms: u64,
        store: &mut S,
    ) -> Result<(), StartError> {
        if self.is_running() {
            return Err(StartError::AlreadyRunning);
        }
        if self.outcome.is_some() {
            return Err(StartError::AwaitingAcknowledge);
        }

        self.tuning.validate()?;
        match load_config(store) {
            Ok(config) => self.apply_config(config),
            Err(e) => warn!("Failed to reload configuration: {}, using current", e),
        }
        self.config.validate(self.tuning.safety_ceiling_c)?;

        let snapshot = LearnedSettings::load(store, &self.config.roles);
        let learning = LearningEngine::new(snapshot, &self.config.roles, self.tuning.learning);
        let profile = Profile::for_mode(mode, &self.config, &self.tuning);

        self.reader.reset_fault();
        self.safety.clear_sensor_fault();
        self.fault = None;
        self.bank.all_off();
        self.actuator.load(&self.bank);

        info!(
            "Starting {} run ({} phases, learning {})",
            mode,
            profile.len(),
            learning.learning_mode()
        );
        self.run = Some(ActiveRun {
            machine: PhaseMachine::start(profile, now_ms),
            learning,
        });

        Ok(())
    }

    fn apply_config(&mut self, config: OvenConfig) {
        if config.roles != self.config.roles {
            self.bank = OutputBank::new(&config.roles);
            self.actuator = DutyCycleActuator::new(
                &config.roles,
                self.tuning.slots_per_period,
                self.tuning.max_simultaneous_heaters,
            );
        }
        self.config = config;
    }

    /// Abort the running run; heating is zeroed before this returns
    fn abort(&mut self, now_ms: u64, cause: AbortCause) {
        if let Some(run) = self.run.as_mut() {
            run.machine.abort(now_ms);
        }
        if let AbortCause::Fault(fault) = cause {
            self.fault = Some(fault);
        }
        self.outcome = Some(RunOutcome::Aborted(cause));
        self.apply_outputs();
        self.actuator.load(&self.bank);
    }

    /// Return to idle after a run has ended
    pub fn acknowledge(&mut self) {
        if self.is_running() {
            return;
        }
        if self.outcome.take().is_some() {
            info!("Run acknowledged");
        }
        self.run = None;
        self.fault = None;
        self.reader.reset_fault();
        self.safety.clear_sensor_fault();
        self.bank.all_off();
        self.actuator.load(&self.bank);
    }

    /// Run one control period
    pub fn tick<S: SettingsStore>(
        &mut self,
        now_ms: u64,
        raw: Result<f32, SensorError>,
        store: &mut S,
    ) -> Option<RunEvent> {
        let reading = self.reader.push(raw);
        self.safety.update(reading);

        let event = match self.safety.check() {
            SafetyStatus::Fault(fault) if self.is_running() => {
                error!("Safety fault: {}", fault);
                let cause = AbortCause::Fault(fault);
                self.abort(now_ms, cause);
                Some(RunEvent::Aborted(cause))
            }
            // Idle or ended: surface the fault, the outcome keeps the abort cause
            SafetyStatus::Fault(fault) => {
                if self.fault != Some(fault) {
                    error!("Safety fault while not running: {}", fault);
                }
                self.fault = Some(fault);
                None
            }
            SafetyStatus::Ok => {
                if self.run.is_none() {
                    self.fault = None;
                }
                self.evaluate(now_ms, reading, store)
            }
        };

        self.apply_outputs();
        self.actuator.load(&self.bank);
        event
    }

    fn evaluate<S: SettingsStore>(
        &mut self,
        now_ms: u64,
        reading: Result<f32, SensorFault>,
        store: &mut S,
    ) -> Option<RunEvent> {
        let run = self.run.as_mut()?;
        match run.machine.evaluate(now_ms, reading) {
            Step::Stay => None,
            Step::Advanced { completed, next } => {
                Self::learn(run, &completed, store);
                match completed.reason {
                    AdvanceReason::TimedOut { shortfall_c } => Some(RunEvent::TargetMissed {
                        phase: completed.id,
                        next,
                        shortfall_c,
                    }),
                    _ => Some(RunEvent::PhaseChanged {
                        from: completed.id,
                        to: next,
                    }),
                }
            }
            Step::Finished { completed } => {
                Self::learn(run, &completed, store);
                let mode = run.machine.profile().mode();
                if mode == Mode::Reflow {
                    run.learning.finish_run(store);
                }
                info!("{} run complete", mode);
                self.outcome = Some(RunOutcome::Completed(mode));
                Some(RunEvent::Completed(mode))
            }
            Step::Aborted(fault) => {
                let cause = AbortCause::Fault(fault);
                self.abort(now_ms, cause);
                Some(RunEvent::Aborted(cause))
            }
        }
    }

    /// Persist learned duty cycles for a completed reflow phase
    fn learn<S: SettingsStore>(run: &mut ActiveRun, completed: &CompletedPhase, store: &mut S) {
        if run.machine.profile().mode() != Mode::Reflow {
            return;
        }
        let Some(phase) = completed.id.learned() else {
            return;
        };
        let ideal_s = run
            .machine
            .profile()
            .find(completed.id)
            .and_then(|p| p.ideal_duration_s);
        if let (Some(actual_s), Some(ideal_s)) = (completed.time_to_target_s, ideal_s) {
            run.learning
                .learn_phase(phase, TrajectoryError { actual_s, ideal_s }, store);
        }
    }

    /// Set the output bank from the run state
    fn apply_outputs(&mut self) {
        let Some(run) = self.run.as_mut() else {
            self.bank.all_off();
            return;
        };

        if run.machine.is_aborted() {
            self.bank.heating_off();
            let hot = self
                .reader
                .temperature()
                .map_or(true, |t| t >= self.tuning.safe_restart_c);
            let fans = if hot { 100 } else { 0 };
            self.bank.set_role_duty_cycle(OutputRole::ConvectionFan, fans);
            self.bank.set_role_duty_cycle(OutputRole::CoolingFan, fans);
            return;
        }

        let Some(phase) = run.machine.current().copied() else {
            self.bank.all_off();
            return;
        };

        self.bank
            .set_role_duty_cycle(OutputRole::ConvectionFan, phase.fans.convection);
        self.bank
            .set_role_duty_cycle(OutputRole::CoolingFan, phase.fans.cooling);

        let heat = match phase.heating {
            HeatingDrive::Off => None,
            HeatingDrive::Fixed(learned) => Some(learned),
            HeatingDrive::Regulated(learned) => {
                let on = !run.machine.target_reached()
                    || regulate(&phase, run.machine.run_mut(), &self.tuning);
                on.then_some(learned)
            }
        };
        match heat {
            Some(learned) => apply_learned(&mut self.bank, run.learning.snapshot(), learned),
            None => self.bank.heating_off(),
        }
    }

    /// Write the current slot's states to the outputs
    pub fn drive<O: OutputDriver>(&self, slot: u8, outputs: &mut O) {
        self.actuator.drive(slot, outputs);
    }

    /// Turn every output off immediately
    pub fn force_off<O: OutputDriver>(&mut self, outputs: &mut O) {
        self.bank.all_off();
        self.actuator.force_off(outputs);
    }

    /// Status for the display layer
    pub fn status(&self, now_ms: u64) -> OvenStatus {
        let mut status = OvenStatus {
            mode: None,
            phase: None,
            temperature_c: self.reader.temperature(),
            target_c: None,
            phase_elapsed_s: 0,
            run_elapsed_s: 0,
            fault: self.fault,
            outcome: self.outcome,
            learning: false,
            heating: self.bank.is_heating(),
        };

        if let Some(run) = &self.run {
            let state = run.machine.run();
            status.mode = Some(state.mode);
            status.phase = Some(run.machine.phase_id());
            status.target_c = run.machine.current().and_then(|p| p.target_c);
            status.learning = run.learning.learning_mode() && state.mode == Mode::Reflow;
            if run.machine.is_running() {
                status.phase_elapsed_s = state.phase_elapsed_s(now_ms);
                status.run_elapsed_s = state.run_elapsed_s(now_ms);
            }
        }

        status
    }
}

/// Drive every heating element at its learned duty for a phase
fn apply_learned(bank: &mut OutputBank, snapshot: &LearnedSettings, phase: LearnedPhase) {
    for index in 0..MAX_OUTPUTS {
        let role = bank.role(index);
        if !role.is_heating_element() {
            continue;
        }
        let duty = if is_learned(phase, role) {
            snapshot.duty_cycle(phase, index)
        } else {
            0
        };
        bank.set_duty_cycle(index, duty);
    }
}

/// On/off regulation around a reached target, anticipating inertia
///
/// Returns whether heating should be on and updates the latch.
fn regulate(phase: &PhaseDefinition, run: &mut RunState, tuning: &ControlTuning) -> bool {
    let (Some(target_c), Some(temperature_c)) = (phase.target_c, run.last_temperature_c) else {
        return false;
    };
    let rate = run.rate_c_per_s().unwrap_or(0.0);
    let predicted_c = temperature_c + rate * tuning.inertia_lookahead_s;

    let latch = &mut run.progress.heat_enabled;
    if *latch && predicted_c >= target_c {
        trace!("Regulator off at {}C (predicted {}C)", temperature_c, predicted_c);
        *latch = false;
    } else if !*latch && temperature_c < target_c - tuning.regulation_hysteresis_c {
        trace!("Regulator on at {}C", temperature_c);
        *latch = true;
    }
    *latch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::MemoryStore;
    use crate::config::{ConfigError, SettingId};

    fn unfiltered() -> ControlTuning {
        let mut tuning = ControlTuning::default();
        tuning.sensor.filter_alpha = 1.0;
        tuning
    }

    fn setup() -> (OvenController, MemoryStore) {
        let mut store = MemoryStore::new();
        let controller = OvenController::load(&mut store, unfiltered()).unwrap();
        (controller, store)
    }

    fn started(mode: Mode) -> (OvenController, MemoryStore) {
        let (mut controller, mut store) = setup();
        controller
            .handle(Command::Start(mode), 0, &mut store)
            .unwrap();
        (controller, store)
    }

    #[test]
    fn test_load_initializes_store() {
        let (controller, store) = setup();
        assert_eq!(store.get(SettingId::NeedsInit), 0);
        assert_eq!(*controller.config(), OvenConfig::default());
        assert!(!controller.is_running());
    }

    #[test]
    fn test_start_and_first_phases() {
        let (mut controller, mut store) = started(Mode::Reflow);
        assert!(controller.is_running());
        assert_eq!(
            controller.status(0).phase,
            Some(PhaseId::Init)
        );

        let event = controller.tick(0, Ok(25.0), &mut store);
        assert_eq!(
            event,
            Some(RunEvent::PhaseChanged {
                from: PhaseId::Init,
                to: PhaseId::Presoak
            })
        );

        // Seeds (settings changed on a fresh store): presoak 80/100/60, convection on
        let outputs = controller.outputs();
        assert_eq!(outputs.duty_cycle(0), 80);
        assert_eq!(outputs.duty_cycle(1), 100);
        assert_eq!(outputs.duty_cycle(2), 60);
        assert_eq!(outputs.duty_cycle(3), 100);
        assert!(controller.status(0).learning);
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let (mut controller, mut store) = setup();
        for id in [
            SettingId::Output0Role,
            SettingId::Output1Role,
            SettingId::Output2Role,
        ] {
            store.set(id, OutputRole::Unused.as_u8());
        }
        assert_eq!(
            controller.start(Mode::Reflow, 0, &mut store),
            Err(StartError::ConfigurationInvalid(
                ConfigError::NoHeatingElement
            ))
        );
        assert!(!controller.is_running());
    }

    #[test]
    fn test_start_twice() {
        let (mut controller, mut store) = started(Mode::Bake);
        assert_eq!(
            controller.start(Mode::Reflow, 1000, &mut store),
            Err(StartError::AlreadyRunning)
        );
    }

    #[test]
    fn test_operator_abort_zeroes_heating() {
        let (mut controller, mut store) = started(Mode::Reflow);
        controller.tick(0, Ok(25.0), &mut store);
        controller.tick(1000, Ok(28.0), &mut store);
        assert!(controller.outputs().is_heating());

        let event = controller
            .handle(Command::Abort, 1500, &mut store)
            .unwrap();
        assert_eq!(event, Some(RunEvent::Aborted(AbortCause::Operator)));
        assert!(!controller.outputs().is_heating());
        assert_eq!(controller.status(1500).phase, Some(PhaseId::Abort));

        // Cool oven: fans off too
        assert_eq!(controller.outputs().duty_cycle(3), 0);

        // Must acknowledge before starting again
        assert_eq!(
            controller.start(Mode::Reflow, 2000, &mut store),
            Err(StartError::AwaitingAcknowledge)
        );
        controller
            .handle(Command::Acknowledge, 2000, &mut store)
            .unwrap();
        assert_eq!(controller.status(2000).outcome, None);
        assert!(controller.start(Mode::Reflow, 3000, &mut store).is_ok());
    }

    #[test]
    fn test_abort_fans_run_while_hot() {
        let (mut controller, mut store) = started(Mode::Reflow);
        controller.tick(0, Ok(25.0), &mut store);
        controller.tick(1000, Ok(120.0), &mut store);
        controller.handle(Command::Abort, 1500, &mut store).unwrap();
        assert_eq!(controller.outputs().duty_cycle(3), 100);

        controller.tick(2000, Ok(60.0), &mut store);
        assert_eq!(controller.outputs().duty_cycle(3), 100);
        controller.tick(3000, Ok(45.0), &mut store);
        assert_eq!(controller.outputs().duty_cycle(3), 0);
        assert!(!controller.outputs().is_heating());
    }

    #[test]
    fn test_ceiling_aborts_same_tick() {
        let (mut controller, mut store) = started(Mode::Reflow);
        controller.tick(0, Ok(25.0), &mut store);
        assert!(controller.outputs().is_heating());

        let event = controller.tick(1000, Ok(295.0), &mut store);
        let fault = Fault::SafetyLimitExceeded {
            temperature_c: 295.0,
        };
        assert_eq!(event, Some(RunEvent::Aborted(AbortCause::Fault(fault))));
        assert!(!controller.outputs().is_heating());
        assert_eq!(controller.status(1000).fault, Some(fault));
    }

    #[test]
    fn test_ceiling_while_idle_surfaces_fault() {
        let (mut controller, mut store) = setup();
        assert_eq!(controller.tick(0, Ok(300.0), &mut store), None);
        assert_eq!(
            controller.status(0).fault,
            Some(Fault::SafetyLimitExceeded {
                temperature_c: 300.0
            })
        );
        controller.tick(1000, Ok(25.0), &mut store);
        assert_eq!(controller.status(1000).fault, None);
    }

    #[test]
    fn test_ceiling_after_abort_surfaces_fault() {
        let (mut controller, mut store) = started(Mode::Reflow);
        controller.tick(0, Ok(25.0), &mut store);
        controller.tick(1000, Ok(120.0), &mut store);
        controller.handle(Command::Abort, 1500, &mut store).unwrap();
        assert_eq!(controller.status(1500).fault, None);

        assert_eq!(controller.tick(2000, Ok(300.0), &mut store), None);
        let status = controller.status(2000);
        assert_eq!(
            status.fault,
            Some(Fault::SafetyLimitExceeded {
                temperature_c: 300.0
            })
        );
        assert_eq!(status.outcome, Some(RunOutcome::Aborted(AbortCause::Operator)));
        assert!(!controller.outputs().is_heating());

        // Cleared by acknowledging once the oven is back in range
        controller.tick(3000, Ok(100.0), &mut store);
        controller.acknowledge();
        assert_eq!(controller.status(3000).fault, None);
    }

    #[test]
    fn test_sensor_fault_aborts() {
        let (mut controller, mut store) = started(Mode::Reflow);
        controller.tick(0, Ok(25.0), &mut store);
        controller.tick(1000, Ok(-45.0), &mut store);
        controller.tick(2000, Ok(-45.0), &mut store);
        assert!(controller.is_running());

        let event = controller.tick(3000, Ok(-45.0), &mut store);
        assert_eq!(
            event,
            Some(RunEvent::Aborted(AbortCause::Fault(Fault::Sensor(
                SensorFault::ShortCircuit
            ))))
        );
        assert!(!controller.outputs().is_heating());
        // Temperature unknown: fans stay on
        assert_eq!(controller.outputs().duty_cycle(3), 100);
    }

    #[test]
    fn test_learned_values_used_when_trusted() {
        let (mut controller, mut store) = setup();
        store.set(SettingId::SettingsChanged, 0);
        store.set(SettingId::PresoakDuty0, 55);
        controller.start(Mode::Reflow, 0, &mut store).unwrap();
        controller.tick(0, Ok(25.0), &mut store);
        assert_eq!(controller.outputs().duty_cycle(0), 55);
        assert_eq!(
            controller.learned().unwrap().duty_cycle(LearnedPhase::Presoak, 0),
            55
        );
    }

    #[test]
    fn test_regulator_latch() {
        let tuning = ControlTuning::default();
        let profile = Profile::reflow(&OvenConfig::default(), &tuning);
        let phase = *profile.find(PhaseId::Reflow).unwrap();
        let mut run = RunState::new(Mode::Reflow, 0);

        // Rising 2C/s: 237 + 2*2 >= 240 cuts heat early
        run.record(0, 235.0);
        run.record(1000, 237.0);
        assert!(!regulate(&phase, &mut run, &tuning));

        // Stays off inside the hysteresis band
        run.record(2000, 239.5);
        run.record(3000, 239.2);
        assert!(!regulate(&phase, &mut run, &tuning));

        // Back on below target - 1C
        run.record(4000, 238.8);
        assert!(regulate(&phase, &mut run, &tuning));
    }

    #[test]
    fn test_bake_does_not_learn() {
        let (mut controller, mut store) = started(Mode::Bake);
        store.writes.clear();
        controller.tick(0, Ok(25.0), &mut store);
        assert_eq!(controller.status(0).phase, Some(PhaseId::Heatup));
        controller.tick(1000, Ok(115.0), &mut store);
        assert_eq!(controller.status(1000).phase, Some(PhaseId::Bake));
        assert!(store.writes.is_empty());
        assert!(!controller.status(1000).learning);
    }
}
