//! Simulation - the context object for one run
//!
//! A [`Simulation`] owns everything a run needs: the configuration it was
//! built from, the lattice, the rule, the scheduler, the shared colour
//! buffer, and the attached analyses. Components receive what they need
//! from here rather than reading shared globals.
//!
//! Changing the lattice shape, topology or rule means setting up a new
//! `Simulation`.

use crate::analysis::{Analysis, AnalysisId, GenerationSnapshot};
use crate::color_buffer::ColorBuffer;
use crate::config::{SchedulerConfig, SimulationConfig};
use crate::error::{Error, Result};
use crate::scheduler::GenerationScheduler;
use crate::setup::{self, BuildOutcome};
use lattica_core::{Lattice, Rule, RuleRegistry, TopologyRegistry};
use std::sync::Arc;
use tracing::{debug, info};

/// One simulation run
///
/// ```
/// use lattica_hub::{Simulation, SimulationConfig};
/// use lattica_core::InitialCondition;
///
/// let config = SimulationConfig {
///     rows: 5,
///     columns: 5,
///     rule: "majority".into(),
///     topology: "square-4".into(),
///     initial: InitialCondition::Blank,
///     ..SimulationConfig::default()
/// };
/// let mut sim = Simulation::setup(config).unwrap();
/// assert_eq!(sim.increment_one_generation().unwrap(), 1);
///
/// assert!(sim.rewind_one_generation().unwrap());
/// assert_eq!(sim.generation(), 0);
/// // At the rewind floor, rewinding is a no-op
/// assert!(!sim.rewind_one_generation().unwrap());
/// ```
pub struct Simulation {
    config: SimulationConfig,
    outcome: BuildOutcome,
    lattice: Lattice,
    rule: Arc<dyn Rule>,
    scheduler: GenerationScheduler,
    colors: Arc<ColorBuffer>,
    analyses: Vec<(AnalysisId, Box<dyn Analysis>)>,
    next_analysis: u32,
}

impl Simulation {
    /// Set up a run using the built-in rules and topologies
    pub fn setup(config: SimulationConfig) -> Result<Self> {
        Self::setup_with(
            config,
            &RuleRegistry::with_builtin(),
            &TopologyRegistry::with_builtin(),
        )
    }

    /// Set up a run resolving ids against the given registries
    pub fn setup_with(
        config: SimulationConfig,
        rules: &RuleRegistry,
        topologies: &TopologyRegistry,
    ) -> Result<Self> {
        let built = setup::build(&config, rules, topologies)?;
        let config = built.outcome.config.clone();
        let scheduler = GenerationScheduler::new(config.scheduler_config());
        let colors = Arc::new(
            ColorBuffer::new(built.lattice.len())
                .with_averaging(config.averaging_window),
        );
        colors.refresh(&built.lattice, built.rule.as_ref());

        Ok(Self {
            config,
            outcome: built.outcome,
            lattice: built.lattice,
            rule: built.rule,
            scheduler,
            colors,
            analyses: Vec::new(),
            next_analysis: 0,
        })
    }

    /// The configuration this run was actually built with
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// How setup got here (requested settings or a degraded fallback)
    pub fn build_outcome(&self) -> &BuildOutcome {
        &self.outcome
    }

    /// The lattice being simulated
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    /// The shared display colours, readable from any thread
    pub fn colors(&self) -> &Arc<ColorBuffer> {
        &self.colors
    }

    pub fn generation(&self) -> u64 {
        self.lattice.generation()
    }

    // ========================================================================
    // Generations
    // ========================================================================

    /// Advance one generation, then run every analysis
    ///
    /// Returns the new generation number. A rule fault leaves the lattice
    /// at its previous generation and skips the analyses.
    pub fn increment_one_generation(&mut self) -> Result<u64> {
        let generation = self
            .scheduler
            .advance(&self.lattice, self.rule.as_ref(), &self.colors)?;

        if !self.analyses.is_empty() {
            let snapshot = GenerationSnapshot {
                generation,
                lattice: &self.lattice,
                rule: self.rule.as_ref(),
            };
            for (_, analysis) in &mut self.analyses {
                analysis.on_generation(&snapshot);
            }
            // Analyses may have changed tags
            self.colors.refresh(&self.lattice, self.rule.as_ref());
        }
        Ok(generation)
    }

    /// Check whether a rewind would move the lattice back
    pub fn can_rewind(&self) -> bool {
        self.analyses.is_empty() && self.lattice.can_rewind()
    }

    /// Step every cell back one generation
    ///
    /// Returns `Ok(false)` without changing anything when the retained
    /// history is exhausted. Fails with [`Error::RewindNotPermitted`]
    /// while analyses are attached, since they have already seen the
    /// generations a rewind would discard.
    ///
    /// # Example
    ///
    /// ```
    /// use lattica_hub::{PopulationHistory, Simulation, SimulationConfig};
    ///
    /// let config = SimulationConfig {
    ///     rows: 4,
    ///     columns: 4,
    ///     ..SimulationConfig::default()
    /// };
    /// let mut sim = Simulation::setup(config).unwrap();
    /// sim.increment_one_generation().unwrap();
    /// sim.increment_one_generation().unwrap();
    /// assert!(sim.rewind_one_generation().unwrap());
    /// assert_eq!(sim.generation(), 1);
    ///
    /// let id = sim.add_analysis(Box::new(PopulationHistory::new()));
    /// assert!(sim.rewind_one_generation().is_err());
    /// sim.remove_analysis(id);
    /// assert!(sim.rewind_one_generation().unwrap());
    /// assert_eq!(sim.generation(), 0);
    /// ```
    pub fn rewind_one_generation(&mut self) -> Result<bool> {
        if !self.analyses.is_empty() {
            return Err(Error::RewindNotPermitted(format!(
                "{} analyses attached",
                self.analyses.len()
            )));
        }
        if !self.lattice.rewind() {
            debug!(generation = self.generation(), "rewind floor reached");
            return Ok(false);
        }
        self.colors.refresh(&self.lattice, self.rule.as_ref());
        Ok(true)
    }

    // ========================================================================
    // Processor Configuration API
    // ========================================================================

    /// Set the number of worker shards
    ///
    /// The value is clamped to `[1, max_cores()]` and takes effect at the
    /// next generation, which re-partitions the lattice. Returns the
    /// effective count.
    ///
    /// # Arguments
    ///
    /// * `n` - Number of shards (1 updates serially on the calling thread)
    ///
    /// # Example
    ///
    /// ```
    /// use lattica_hub::{max_cores, Simulation, SimulationConfig};
    ///
    /// let config = SimulationConfig {
    ///     rows: 6,
    ///     columns: 6,
    ///     ..SimulationConfig::default()
    /// };
    /// let mut sim = Simulation::setup(config).unwrap();
    /// assert_eq!(sim.set_processor_count(2), 2.min(max_cores()));
    /// assert_eq!(sim.set_processor_count(0), 1);
    /// assert_eq!(sim.processor_count(), 1);
    /// ```
    pub fn set_processor_count(&mut self, n: usize) -> usize {
        self.set_scheduler_config(SchedulerConfig::with_processor_count(n))
    }

    /// Replace the scheduler configuration, returning the effective count
    ///
    /// Unlike [`set_processor_count`](Self::set_processor_count) this keeps
    /// an unclamped [`SchedulerConfig::exact`] count as given.
    pub fn set_scheduler_config(&mut self, config: SchedulerConfig) -> usize {
        self.scheduler.set_config(config);
        self.config.processor_count = config.processor_count();
        config.processor_count()
    }

    /// Current number of worker shards
    pub fn processor_count(&self) -> usize {
        self.scheduler.processor_count()
    }

    pub fn scheduler(&self) -> &GenerationScheduler {
        &self.scheduler
    }

    // ========================================================================
    // Analyses
    // ========================================================================

    /// Attach an analysis; it runs after every following generation
    ///
    /// The returned id identifies the analysis for
    /// [`remove_analysis`](Self::remove_analysis) and is also the owner of
    /// any tags it places.
    ///
    /// # Example
    ///
    /// ```
    /// use lattica_hub::{PopulationHistory, Simulation, SimulationConfig};
    ///
    /// let config = SimulationConfig {
    ///     rows: 4,
    ///     columns: 4,
    ///     ..SimulationConfig::default()
    /// };
    /// let mut sim = Simulation::setup(config).unwrap();
    /// let history = PopulationHistory::new();
    /// let log = history.log();
    /// sim.add_analysis(Box::new(history));
    ///
    /// sim.increment_one_generation().unwrap();
    /// sim.increment_one_generation().unwrap();
    /// let generations: Vec<u64> = log.lock().unwrap().iter().map(|(g, _)| *g).collect();
    /// assert_eq!(generations, vec![0, 1, 2]);
    /// ```
    pub fn add_analysis(&mut self, mut analysis: Box<dyn Analysis>) -> AnalysisId {
        let id = AnalysisId(self.next_analysis);
        self.next_analysis += 1;
        let snapshot = GenerationSnapshot {
            generation: self.generation(),
            lattice: &self.lattice,
            rule: self.rule.as_ref(),
        };
        analysis.on_attach(id, &snapshot);
        info!(%id, name = analysis.name(), "analysis attached");
        self.analyses.push((id, analysis));
        id
    }

    /// Detach an analysis, letting it clear its tags
    pub fn remove_analysis(&mut self, id: AnalysisId) -> Option<Box<dyn Analysis>> {
        let position = self.analyses.iter().position(|(a, _)| *a == id)?;
        let (_, mut analysis) = self.analyses.remove(position);
        analysis.on_detach(&self.lattice);
        self.colors.refresh(&self.lattice, self.rule.as_ref());
        info!(%id, name = analysis.name(), "analysis detached");
        Some(analysis)
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.len()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("lattice", &self.lattice)
            .field("rule", &self.rule.name())
            .field("scheduler", &self.scheduler)
            .field("analyses", &self.analyses.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ChangeHighlighter, PopulationHistory};
    use lattica_core::{Coordinate, InitialCondition, Rgb};

    fn blinker_config() -> SimulationConfig {
        SimulationConfig {
            rows: 5,
            columns: 5,
            rule: "life".into(),
            topology: "square-8".into(),
            initial: InitialCondition::Blank,
            rewind_depth: 4,
            ..SimulationConfig::default()
        }
    }

    fn blinker() -> Simulation {
        let sim = Simulation::setup(blinker_config()).unwrap();
        for column in 1..4 {
            let cell = sim.lattice().cell_at(Coordinate::new(2, column)).unwrap();
            cell.fill_history(lattica_core::CellState::binary(true));
        }
        sim
    }

    #[test]
    fn test_blinker_oscillates() {
        let mut sim = blinker();
        let horizontal = sim.lattice().to_grid_string();
        assert_eq!(sim.increment_one_generation().unwrap(), 1);
        assert_eq!(sim.lattice().to_grid_string(), ".....\n..#..\n..#..\n..#..\n.....\n");
        sim.increment_one_generation().unwrap();
        assert_eq!(sim.lattice().to_grid_string(), horizontal);
    }

    #[test]
    fn test_rewind_restores_previous_generation() {
        let mut sim = blinker();
        let start = sim.lattice().current_states();
        sim.increment_one_generation().unwrap();
        sim.increment_one_generation().unwrap();
        sim.increment_one_generation().unwrap();

        for _ in 0..3 {
            assert!(sim.rewind_one_generation().unwrap());
        }
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.lattice().current_states(), start);
        assert!(!sim.rewind_one_generation().unwrap());
    }

    #[test]
    fn test_rewind_limited_by_history() {
        let mut sim = blinker();
        for _ in 0..10 {
            sim.increment_one_generation().unwrap();
        }
        // capacity = 1 + 4 slots, one of which must stay
        let mut rewound = 0;
        while sim.rewind_one_generation().unwrap() {
            rewound += 1;
        }
        assert_eq!(rewound, 4);
        assert_eq!(sim.generation(), 6);
    }

    #[test]
    fn test_rewind_refused_with_analysis() {
        let mut sim = blinker();
        sim.increment_one_generation().unwrap();
        let id = sim.add_analysis(Box::new(PopulationHistory::new()));
        assert!(!sim.can_rewind());
        assert!(matches!(
            sim.rewind_one_generation(),
            Err(Error::RewindNotPermitted(_))
        ));

        assert!(sim.remove_analysis(id).is_some());
        assert!(sim.remove_analysis(id).is_none());
        assert!(sim.rewind_one_generation().unwrap());
    }

    #[test]
    fn test_population_history() {
        let mut sim = blinker();
        let history = PopulationHistory::new();
        let log = history.log();
        sim.add_analysis(Box::new(history));
        sim.increment_one_generation().unwrap();
        sim.increment_one_generation().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_change_highlighter_tags_changed_cells() {
        let mut sim = blinker();
        let id = sim.add_analysis(Box::new(ChangeHighlighter::new()));
        sim.increment_one_generation().unwrap();

        let lattice = sim.lattice();
        let born = lattice.cell_at(Coordinate::new(1, 2)).unwrap();
        let stable = lattice.cell_at(Coordinate::new(2, 2)).unwrap();
        assert!(born.is_tagged());
        assert!(!stable.is_tagged());
        assert_eq!(sim.colors().get(born.index()), Some(Rgb::HIGHLIGHT));

        sim.remove_analysis(id);
        let born = sim.lattice().cell_at(Coordinate::new(1, 2)).unwrap();
        assert!(!born.is_tagged());
        assert_eq!(sim.colors().get(born.index()), Some(Rgb::BLACK));
    }

    #[test]
    fn test_processor_count_between_generations() {
        let mut sim = blinker();
        sim.increment_one_generation().unwrap();
        let effective = sim.set_scheduler_config(SchedulerConfig::exact(3));
        assert_eq!(effective, 3);
        assert_eq!(sim.config().processor_count, 3);
        sim.increment_one_generation().unwrap();
        assert_eq!(sim.scheduler().plan().shard_count(), 3);
    }
}
