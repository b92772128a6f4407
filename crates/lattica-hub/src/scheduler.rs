//! GenerationScheduler - advance every cell by one generation
//!
//! Execution flow for one generation:
//! 1. Re-partition if the processor count changed since the last generation
//! 2. Run each shard (serially when there is one processor, on a rayon pool
//!    otherwise); every cell reads its neighbours pinned to generation `G`
//! 3. Barrier: collecting the shard results waits for every shard
//! 4. On any fault, roll back cells that already reached `G + 1` and report
//!    the first fault in shard order
//!
//! Shards write only their own cells and colour slots. Reads of neighbours
//! in other shards go through each cell's history, so a neighbour that has
//! already advanced still answers for generation `G`.

use crate::color_buffer::ColorBuffer;
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::shard::ShardPlan;
use lattica_core::{Lattice, Rule};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Runs one generation at a time across a fixed set of shards
pub struct GenerationScheduler {
    config: SchedulerConfig,
    plan: ShardPlan,
    pool: Option<ThreadPool>,
    /// Times the plan has been rebuilt
    partitions: u64,
}

impl GenerationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            plan: ShardPlan::new(0, config.processor_count()),
            config,
            pool: None,
            partitions: 0,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn processor_count(&self) -> usize {
        self.config.processor_count()
    }

    /// Change the processor count
    ///
    /// Takes effect at the start of the next generation.
    pub fn set_config(&mut self, config: SchedulerConfig) {
        if config != self.config {
            debug!(
                from = self.config.processor_count(),
                to = config.processor_count(),
                "processor count changed"
            );
            self.config = config;
        }
    }

    /// The shard plan used by the most recent generation
    pub fn plan(&self) -> &ShardPlan {
        &self.plan
    }

    /// How many times shards have been computed
    pub fn partition_count(&self) -> u64 {
        self.partitions
    }

    /// Advance every cell of `lattice` by one generation
    ///
    /// Returns the new generation number. On error the lattice is left at
    /// its previous generation.
    pub fn advance(
        &mut self,
        lattice: &Lattice,
        rule: &dyn Rule,
        colors: &ColorBuffer,
    ) -> Result<u64> {
        self.ensure_plan(lattice.len());
        let generation = lattice.generation();

        self.ensure_pool();

        let shards = self.plan.shards();
        let outcomes: Vec<Result<()>> = match &self.pool {
            Some(pool) => pool.install(|| {
                shards
                    .par_iter()
                    .enumerate()
                    .map(|(shard, range)| run_shard(shard, range.clone(), lattice, rule, colors))
                    .collect()
            }),
            None => shards
                .iter()
                .enumerate()
                .map(|(shard, range)| run_shard(shard, range.clone(), lattice, rule, colors))
                .collect(),
        };

        match outcomes.into_iter().find_map(|o| o.err()) {
            None => Ok(generation + 1),
            Some(fault) => {
                let rolled_back = roll_back(lattice, rule, colors, generation);
                error!(
                    generation,
                    rolled_back,
                    error = %fault,
                    "generation failed, lattice restored"
                );
                Err(fault)
            }
        }
    }

    fn ensure_plan(&mut self, cell_count: usize) {
        let processors = self.config.processor_count();
        if !self.plan.matches(cell_count, processors) {
            self.plan = ShardPlan::new(cell_count, processors);
            self.partitions += 1;
            debug!(
                cells = cell_count,
                shards = self.plan.shard_count(),
                "re-partitioned lattice"
            );
        }
    }

    /// Keep a pool sized to the processor count, or none to run serially
    fn ensure_pool(&mut self) {
        let threads = self.config.processor_count();
        if threads <= 1 {
            self.pool = None;
            return;
        }
        let stale = self
            .pool
            .as_ref()
            .map_or(true, |pool| pool.current_num_threads() != threads);
        if stale {
            self.pool = match build_pool(threads) {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "falling back to serial updates");
                    None
                }
            };
        }
    }
}

impl Default for GenerationScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for GenerationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationScheduler")
            .field("processor_count", &self.config.processor_count())
            .field("shards", &self.plan.shard_count())
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lattica-shard-{}", i))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))
}

/// Update every cell in `range`, stopping at the first fault
///
/// A panicking rule is caught here so the barrier always sees a result
/// from every shard.
fn run_shard(
    shard: usize,
    range: Range<usize>,
    lattice: &Lattice,
    rule: &dyn Rule,
    colors: &ColorBuffer,
) -> Result<()> {
    catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        for index in range {
            let Some(cell) = lattice.cell(index) else {
                continue;
            };
            let neighbors = lattice.neighbors(index);
            cell.update_state(rule, &neighbors)?;
            colors.paint(rule, cell);
        }
        Ok(())
    }))
    .unwrap_or_else(|payload| {
        Err(Error::WorkerPanicked {
            shard,
            message: panic_message(payload.as_ref()),
        })
    })
}

/// Undo every cell that got past `generation`, returning how many
fn roll_back(lattice: &Lattice, rule: &dyn Rule, colors: &ColorBuffer, generation: u64) -> usize {
    let mut count = 0;
    for cell in lattice.cells() {
        if cell.generation() > generation && cell.undo_update() {
            colors.paint(rule, cell);
            count += 1;
        }
    }
    count
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_core::rules::Majority;
    use lattica_core::{
        Boundary, CellState, Dimensions, LatticeSpec, StateKind, UpdateContext, VonNeumann,
    };
    use std::sync::Arc;

    fn lattice(rows: usize, columns: usize) -> Lattice {
        Lattice::build(&LatticeSpec {
            dimensions: Dimensions::new(rows, columns).unwrap(),
            topology: Arc::new(VonNeumann),
            boundary: Boundary::Wrap,
            initial: CellState::binary(false),
            history_capacity: 3,
            required_generations: 1,
        })
        .unwrap()
    }

    /// Fails (or panics) at one cell index
    struct Explode {
        at: usize,
        panic: bool,
    }

    impl Rule for Explode {
        fn name(&self) -> &str {
            "explode"
        }

        fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> lattica_core::Result<CellState> {
            if ctx.cell().index() == self.at {
                if self.panic {
                    panic!("rule blew up");
                }
                return Err(ctx.fault("rule failed"));
            }
            Ok(CellState::binary(true))
        }

        fn compatible_state(&self) -> CellState {
            StateKind::Binary.blank()
        }
    }

    #[test]
    fn test_serial_advance() {
        let lattice = lattice(4, 4);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::default();

        assert_eq!(scheduler.advance(&lattice, &Majority, &colors).unwrap(), 1);
        assert_eq!(scheduler.advance(&lattice, &Majority, &colors).unwrap(), 2);
        assert!(lattice.cells().iter().all(|c| c.generation() == 2));
        assert_eq!(scheduler.partition_count(), 1);
        assert_eq!(colors.get(0), Some(lattica_core::Rgb::WHITE));
    }

    #[test]
    fn test_repartition_only_on_change() {
        let lattice = lattice(5, 5);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::new(SchedulerConfig::exact(2));

        scheduler.advance(&lattice, &Majority, &colors).unwrap();
        scheduler.advance(&lattice, &Majority, &colors).unwrap();
        assert_eq!(scheduler.partition_count(), 1);

        scheduler.set_config(SchedulerConfig::exact(4));
        assert_eq!(scheduler.plan().shard_count(), 2);
        scheduler.advance(&lattice, &Majority, &colors).unwrap();
        assert_eq!(scheduler.partition_count(), 2);
        assert_eq!(scheduler.plan().shard_count(), 4);
    }

    #[test]
    fn test_fault_rolls_back_whole_generation() {
        let lattice = lattice(4, 4);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::new(SchedulerConfig::exact(4));

        let err = scheduler
            .advance(&lattice, &Explode { at: 9, panic: false }, &colors)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Core(lattica_core::Error::RuleFault { .. })
        ));
        assert!(lattice.cells().iter().all(|c| c.generation() == 0));
        assert_eq!(lattice.population(), 0);

        // The scheduler is still usable afterwards
        assert_eq!(scheduler.advance(&lattice, &Majority, &colors).unwrap(), 1);
    }

    #[test]
    fn test_fault_keeps_rewind_depth() {
        let lattice = lattice(4, 4);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::default();
        scheduler.advance(&lattice, &Majority, &colors).unwrap();
        scheduler.advance(&lattice, &Majority, &colors).unwrap();
        assert!(lattice.cells().iter().all(|c| c.rewind_depth() == 2));

        // Cells 0..15 advance, evicting their oldest entry, before 15 fails
        scheduler
            .advance(&lattice, &Explode { at: 15, panic: false }, &colors)
            .unwrap_err();
        assert!(lattice.cells().iter().all(|c| c.generation() == 2));
        assert!(lattice.cells().iter().all(|c| c.rewind_depth() == 2));
        assert!(lattice.rewind());
        assert!(lattice.rewind());
        assert_eq!(lattice.generation(), 0);
    }

    #[test]
    fn test_panic_is_reported_not_propagated() {
        let lattice = lattice(4, 4);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::new(SchedulerConfig::exact(3));

        let err = scheduler
            .advance(&lattice, &Explode { at: 0, panic: true }, &colors)
            .unwrap_err();
        match err {
            Error::WorkerPanicked { shard, message } => {
                assert_eq!(shard, 0);
                assert_eq!(message, "rule blew up");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(lattice.cells().iter().all(|c| c.generation() == 0));
    }

    #[test]
    fn test_serial_panic_is_caught() {
        let lattice = lattice(2, 2);
        let colors = ColorBuffer::new(lattice.len());
        let mut scheduler = GenerationScheduler::default();
        let err = scheduler
            .advance(&lattice, &Explode { at: 3, panic: true }, &colors)
            .unwrap_err();
        assert!(err.is_rule_fault());
        assert_eq!(lattice.generation(), 0);
    }
}
