//! SimulationController - lifecycle and the run loop
//!
//! The controller owns a [`Simulation`] and drives it from a dedicated
//! thread. Lifecycle:
//!
//! ```text
//! Stopped --start--> Running --pause--> Paused
//!    ^                 |  ^               |
//!    |                 |  +---unpause-----+
//!    +--stop/limit/----+                  |
//!    |  fault                             |
//!    +--------------stop------------------+
//! ```
//!
//! The run loop advances one generation, runs analyses, then sleeps for
//! the configured delay. Pausing or stopping interrupts that sleep at
//! once rather than waiting for it to run out.

use crate::analysis::{Analysis, AnalysisId};
use crate::error::{Error, Result};
use crate::simulation::Simulation;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Why the most recent run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The configured step limit was reached
    StepLimit { steps: u64 },
    /// `stop()` was called
    User,
    /// A rule failed; the message describes the fault
    Fault(String),
}

struct ControlState {
    run_state: RunState,
    stop_reason: Option<StopReason>,
    /// Generations advanced since the last start
    steps_taken: u64,
    max_steps: Option<u64>,
    time_delay: Duration,
    /// Cut the current inter-generation sleep short
    interrupt_delay: bool,
}

impl ControlState {
    fn halt(&mut self, reason: StopReason) {
        self.run_state = RunState::Stopped;
        self.stop_reason = Some(reason);
        self.interrupt_delay = true;
    }

    fn limit_reached(&self) -> bool {
        self.max_steps.is_some_and(|max| self.steps_taken >= max)
    }
}

struct Shared {
    control: Mutex<ControlState>,
    /// Signalled on every control change
    changed: Condvar,
    simulation: Mutex<Simulation>,
    generation: AtomicU64,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn simulation(&self) -> MutexGuard<'_, Simulation> {
        self.simulation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives a simulation on its own thread
///
/// ```
/// use lattica_hub::{RunState, Simulation, SimulationConfig, SimulationController, StopReason};
///
/// let config = SimulationConfig {
///     rows: 8,
///     columns: 8,
///     max_steps: Some(5),
///     ..SimulationConfig::default()
/// };
/// let mut controller = SimulationController::new(Simulation::setup(config).unwrap());
/// controller.start().unwrap();
///
/// assert_eq!(controller.wait_until_stopped(), Some(StopReason::StepLimit { steps: 5 }));
/// assert_eq!(controller.state(), RunState::Stopped);
/// assert_eq!(controller.generation(), 5);
/// ```
pub struct SimulationController {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SimulationController {
    /// Take control of `simulation`, initially stopped
    pub fn new(simulation: Simulation) -> Self {
        let config = simulation.config();
        let control = ControlState {
            run_state: RunState::Stopped,
            stop_reason: None,
            steps_taken: 0,
            max_steps: config.max_steps,
            time_delay: config.time_delay(),
            interrupt_delay: false,
        };
        let generation = simulation.generation();
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(control),
                changed: Condvar::new(),
                simulation: Mutex::new(simulation),
                generation: AtomicU64::new(generation),
            }),
            worker: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stopped -> Running
    ///
    /// The step count restarts at zero, so `max_steps` bounds each run.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut control = self.shared.control();
            if control.run_state != RunState::Stopped {
                return Err(Error::InvalidTransition {
                    from: control.run_state,
                    action: "start",
                });
            }
            control.run_state = RunState::Running;
            control.stop_reason = None;
            control.steps_taken = 0;
            control.interrupt_delay = false;
        }
        // A previous run loop has already exited once the state is Stopped
        self.join_worker();

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("lattica-controller".to_string())
            .spawn(move || run_loop(&shared));
        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("simulation started");
                Ok(())
            }
            Err(e) => {
                self.shared.control().halt(StopReason::Fault(e.to_string()));
                error!(error = %e, "could not spawn controller thread");
                Err(Error::Io(e))
            }
        }
    }

    /// Running -> Paused
    ///
    /// Cuts any inter-generation sleep short. The generation in progress,
    /// if any, completes first. [`unpause`](Self::unpause) resumes the same
    /// run with its step count intact.
    pub fn pause(&self) -> Result<()> {
        self.transition(RunState::Running, RunState::Paused, "pause")
    }

    /// Paused -> Running
    pub fn unpause(&self) -> Result<()> {
        self.transition(RunState::Paused, RunState::Running, "unpause")
    }

    /// Any state -> Stopped, waiting for the run loop to exit
    pub fn stop(&mut self) {
        {
            let mut control = self.shared.control();
            if control.run_state != RunState::Stopped {
                control.halt(StopReason::User);
                info!("simulation stopped by user");
            }
        }
        self.shared.changed.notify_all();
        self.join_worker();
    }

    fn transition(&self, from: RunState, to: RunState, action: &'static str) -> Result<()> {
        let mut control = self.shared.control();
        if control.run_state != from {
            return Err(Error::InvalidTransition {
                from: control.run_state,
                action,
            });
        }
        control.run_state = to;
        control.interrupt_delay = true;
        drop(control);
        self.shared.changed.notify_all();
        debug!(%from, %to, "controller transition");
        Ok(())
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("controller thread panicked");
            }
        }
    }

    /// Block until the run loop reaches Stopped, returning why it stopped
    pub fn wait_until_stopped(&self) -> Option<StopReason> {
        let control = self.shared.control();
        let control = self
            .shared
            .changed
            .wait_while(control, |c| c.run_state != RunState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        control.stop_reason.clone()
    }

    /// Like [`wait_until_stopped`](Self::wait_until_stopped), giving up after `timeout`
    ///
    /// Returns `None` if still not stopped.
    pub fn wait_until_stopped_timeout(&self, timeout: Duration) -> Option<Option<StopReason>> {
        let control = self.shared.control();
        let (control, result) = self
            .shared
            .changed
            .wait_timeout_while(control, timeout, |c| c.run_state != RunState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && control.run_state != RunState::Stopped {
            None
        } else {
            Some(control.stop_reason.clone())
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.shared.control().run_state
    }

    /// Why the last run stopped; `None` before the first run ends
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shared.control().stop_reason.clone()
    }

    /// Generations advanced since the last start
    pub fn steps_taken(&self) -> u64 {
        self.shared.control().steps_taken
    }

    /// Latest completed generation, readable while the loop runs
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Human-readable status line
    pub fn status_message(&self) -> String {
        let generation = self.generation();
        let control = self.shared.control();
        match (&control.run_state, &control.stop_reason) {
            (RunState::Running, _) => format!("running, generation {}", generation),
            (RunState::Paused, _) => format!("paused at generation {}", generation),
            (RunState::Stopped, Some(StopReason::StepLimit { steps })) => format!(
                "stopped after reaching the limit of {} steps, generation {}",
                steps, generation
            ),
            (RunState::Stopped, Some(StopReason::User)) => {
                format!("stopped by user at generation {}", generation)
            }
            (RunState::Stopped, Some(StopReason::Fault(message))) => {
                format!("stopped by fault at generation {}: {}", generation, message)
            }
            (RunState::Stopped, None) => format!("stopped at generation {}", generation),
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Change the inter-generation delay, cutting any current sleep short
    ///
    /// The run loop re-reads the delay before its next sleep, so a long
    /// delay can be shortened without waiting it out.
    ///
    /// # Arguments
    ///
    /// * `delay` - Pause between generations (zero runs flat out)
    ///
    /// # Example
    ///
    /// ```
    /// use lattica_hub::{Simulation, SimulationConfig, SimulationController};
    /// use std::time::Duration;
    ///
    /// let config = SimulationConfig {
    ///     rows: 4,
    ///     columns: 4,
    ///     ..SimulationConfig::default()
    /// };
    /// let controller = SimulationController::new(Simulation::setup(config).unwrap());
    /// controller.set_time_delay(Duration::from_millis(250));
    /// assert_eq!(controller.time_delay(), Duration::from_millis(250));
    /// ```
    pub fn set_time_delay(&self, delay: Duration) {
        let mut control = self.shared.control();
        control.time_delay = delay;
        control.interrupt_delay = true;
        drop(control);
        self.shared.changed.notify_all();
    }

    /// Current inter-generation delay
    pub fn time_delay(&self) -> Duration {
        self.shared.control().time_delay
    }

    /// Change the step limit; applies to the current run
    ///
    /// # Arguments
    ///
    /// * `max_steps` - Generations per run, or `None` to run until stopped
    ///
    /// A limit at or below the steps already taken stops a running loop
    /// at its next check with [`StopReason::StepLimit`].
    pub fn set_max_steps(&self, max_steps: Option<u64>) {
        self.shared.control().max_steps = max_steps;
        self.shared.changed.notify_all();
    }

    /// Set the number of worker shards, effective from the next generation
    ///
    /// Safe to call while running: the count is applied between
    /// generations, never inside one. Returns the count clamped to
    /// `[1, max_cores()]`.
    ///
    /// # Arguments
    ///
    /// * `n` - Number of shards (1 for serial updates)
    ///
    /// # Example
    ///
    /// ```
    /// use lattica_hub::{max_cores, Simulation, SimulationConfig, SimulationController};
    ///
    /// let config = SimulationConfig {
    ///     rows: 4,
    ///     columns: 4,
    ///     ..SimulationConfig::default()
    /// };
    /// let controller = SimulationController::new(Simulation::setup(config).unwrap());
    /// assert_eq!(controller.set_processor_count(64), 64.min(max_cores()));
    /// ```
    pub fn set_processor_count(&self, n: usize) -> usize {
        self.shared.simulation().set_processor_count(n)
    }

    // ========================================================================
    // Direct operations
    // ========================================================================

    /// Advance one generation on the calling thread
    ///
    /// Only allowed while Stopped or Paused.
    pub fn increment_one_generation(&self) -> Result<u64> {
        self.require_idle("step")?;
        let generation = self.shared.simulation().increment_one_generation()?;
        self.shared.generation.store(generation, Ordering::Release);
        Ok(generation)
    }

    /// Step the whole lattice back one generation
    ///
    /// Only allowed while Stopped or Paused and with no analyses attached.
    /// Returns `Ok(false)` when history is exhausted.
    pub fn rewind_one_generation(&self) -> Result<bool> {
        let state = self.state();
        if state == RunState::Running {
            return Err(Error::RewindNotPermitted(format!("simulation is {}", state)));
        }
        let mut simulation = self.shared.simulation();
        let rewound = simulation.rewind_one_generation()?;
        self.shared
            .generation
            .store(simulation.generation(), Ordering::Release);
        Ok(rewound)
    }

    /// Attach an analysis; see [`Simulation::add_analysis`]
    ///
    /// Waits for the generation in progress, so the analysis never sees a
    /// half-advanced lattice.
    pub fn add_analysis(&self, analysis: Box<dyn Analysis>) -> AnalysisId {
        self.shared.simulation().add_analysis(analysis)
    }

    /// Detach an analysis; rewinding is allowed again once none remain
    pub fn remove_analysis(&self, id: AnalysisId) -> Option<Box<dyn Analysis>> {
        self.shared.simulation().remove_analysis(id)
    }

    /// Run `f` with exclusive access to the simulation
    ///
    /// Blocks while a generation is in progress.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        f(&mut self.shared.simulation())
    }

    fn require_idle(&self, action: &'static str) -> Result<()> {
        match self.state() {
            RunState::Running => Err(Error::InvalidTransition {
                from: RunState::Running,
                action,
            }),
            _ => Ok(()),
        }
    }
}

impl Drop for SimulationController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SimulationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationController")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

fn run_loop(shared: &Shared) {
    loop {
        {
            let control = shared.control();
            let mut control = shared
                .changed
                .wait_while(control, |c| c.run_state == RunState::Paused)
                .unwrap_or_else(PoisonError::into_inner);
            if control.run_state == RunState::Stopped {
                return;
            }
            if control.limit_reached() {
                let steps = control.steps_taken;
                finish(shared, control, StopReason::StepLimit { steps });
                return;
            }
            control.interrupt_delay = false;
        }

        let outcome = shared.simulation().increment_one_generation();

        let mut control = shared.control();
        match outcome {
            Ok(generation) => {
                shared.generation.store(generation, Ordering::Release);
                control.steps_taken += 1;
            }
            Err(e) => {
                error!(error = %e, "rule fault, stopping simulation");
                finish(shared, control, StopReason::Fault(e.to_string()));
                return;
            }
        }
        if control.run_state == RunState::Running && control.limit_reached() {
            let steps = control.steps_taken;
            finish(shared, control, StopReason::StepLimit { steps });
            return;
        }

        let delay = control.time_delay;
        if !delay.is_zero() && !control.interrupt_delay {
            let _ = shared
                .changed
                .wait_timeout_while(control, delay, |c| {
                    !c.interrupt_delay && c.run_state == RunState::Running
                })
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn finish(shared: &Shared, mut control: MutexGuard<'_, ControlState>, reason: StopReason) {
    info!(?reason, steps = control.steps_taken, "simulation stopped");
    control.halt(reason);
    drop(control);
    shared.changed.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use lattica_core::{
        CellState, InitialCondition, Rule, RuleRegistry, StateKind, TopologyRegistry,
        UpdateContext,
    };
    use std::sync::Arc;
    use std::time::Instant;

    fn config() -> SimulationConfig {
        SimulationConfig {
            rows: 6,
            columns: 6,
            rule: "life".into(),
            initial: InitialCondition::Random {
                density: 0.4,
                seed: 3,
            },
            ..SimulationConfig::default()
        }
    }

    fn controller(config: SimulationConfig) -> SimulationController {
        SimulationController::new(Simulation::setup(config).unwrap())
    }

    #[test]
    fn test_step_limit() {
        let mut c = controller(SimulationConfig {
            max_steps: Some(7),
            ..config()
        });
        assert_eq!(c.status_message(), "stopped at generation 0");
        c.start().unwrap();
        assert_eq!(c.wait_until_stopped(), Some(StopReason::StepLimit { steps: 7 }));
        assert_eq!(c.generation(), 7);
        assert_eq!(c.steps_taken(), 7);
        assert!(c.status_message().contains("limit of 7 steps"));

        // A second run gets a fresh step budget
        c.start().unwrap();
        assert_eq!(c.wait_until_stopped(), Some(StopReason::StepLimit { steps: 7 }));
        assert_eq!(c.generation(), 14);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut c = controller(config());
        assert!(matches!(
            c.pause(),
            Err(Error::InvalidTransition { from: RunState::Stopped, action: "pause" })
        ));
        assert!(c.unpause().is_err());

        c.set_time_delay(Duration::from_millis(5));
        c.start().unwrap();
        assert!(matches!(c.start(), Err(Error::InvalidTransition { .. })));
        c.stop();
        assert_eq!(c.state(), RunState::Stopped);
        assert_eq!(c.stop_reason(), Some(StopReason::User));
        // Stopping twice is harmless
        c.stop();
    }

    #[test]
    fn test_pause_interrupts_long_delay() {
        let mut c = controller(config());
        c.set_time_delay(Duration::from_secs(60));
        c.start().unwrap();
        // Wait for the first generation, then the loop is asleep
        let deadline = Instant::now() + Duration::from_secs(10);
        while c.generation() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let paused_at = Instant::now();
        c.pause().unwrap();
        assert_eq!(c.state(), RunState::Paused);

        // Rewind and stepping are allowed while paused
        assert!(c.rewind_one_generation().unwrap());
        assert_eq!(c.increment_one_generation().unwrap(), 1);

        c.unpause().unwrap();
        c.stop();
        assert!(paused_at.elapsed() < Duration::from_secs(30));
        assert_eq!(c.stop_reason(), Some(StopReason::User));
    }

    #[test]
    fn test_rewind_refused_while_running() {
        let mut c = controller(config());
        c.set_time_delay(Duration::from_millis(20));
        c.start().unwrap();
        assert!(matches!(
            c.rewind_one_generation(),
            Err(Error::RewindNotPermitted(_))
        ));
        assert!(matches!(
            c.increment_one_generation(),
            Err(Error::InvalidTransition { .. })
        ));
        c.stop();
    }

    struct FailAt(u64);

    impl Rule for FailAt {
        fn name(&self) -> &str {
            "fail-at"
        }

        fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> lattica_core::Result<CellState> {
            if ctx.generation() == self.0 {
                return Err(ctx.fault("scheduled failure"));
            }
            Ok(CellState::binary(false))
        }

        fn compatible_state(&self) -> CellState {
            StateKind::Binary.blank()
        }
    }

    #[test]
    fn test_fault_stops_run() {
        let mut rules = RuleRegistry::new();
        rules.register("fail-at", |_| Ok(Arc::new(FailAt(3)) as Arc<dyn Rule>));
        let config = SimulationConfig {
            rule: "fail-at".into(),
            ..config()
        };
        let sim = Simulation::setup_with(config, &rules, &TopologyRegistry::with_builtin()).unwrap();
        let mut c = SimulationController::new(sim);
        c.start().unwrap();

        match c.wait_until_stopped() {
            Some(StopReason::Fault(message)) => assert!(message.contains("scheduled failure")),
            other => panic!("unexpected stop reason {:?}", other),
        }
        assert_eq!(c.generation(), 3);
        assert!(c.status_message().starts_with("stopped by fault at generation 3"));
        c.with_simulation(|sim| assert_eq!(sim.lattice().generation(), 3));
    }

    #[test]
    fn test_wait_timeout() {
        let mut c = controller(config());
        c.set_time_delay(Duration::from_millis(10));
        c.start().unwrap();
        assert_eq!(c.wait_until_stopped_timeout(Duration::from_millis(20)), None);
        c.stop();
        assert_eq!(
            c.wait_until_stopped_timeout(Duration::from_millis(20)),
            Some(Some(StopReason::User))
        );
    }

    #[test]
    fn test_set_processor_count() {
        let c = controller(config());
        assert_eq!(c.set_processor_count(0), 1);
        assert_eq!(c.increment_one_generation().unwrap(), 1);
    }
}
