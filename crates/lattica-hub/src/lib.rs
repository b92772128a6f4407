//! Lattica Hub - generation scheduling and run control
//!
//! This crate drives a `lattica-core` lattice through time, splitting each
//! generation across worker threads.
//!
//! ## Architecture
//!
//! ```text
//! SimulationController (run-loop thread, lifecycle)
//!  │
//!  └── Simulation (context object for one run)
//!       ├── SimulationConfig
//!       ├── Lattice + Rule
//!       ├── GenerationScheduler ← ShardPlan, rayon pool
//!       ├── ColorBuffer (shared with readers)
//!       └── Analysis[] (run after each generation)
//! ```
//!
//! ## Key Components
//!
//! - [`GenerationScheduler`]: advances every cell by one generation over
//!   disjoint shards and waits for all of them
//! - [`Simulation`]: owns a run's lattice, rule, scheduler and analyses
//! - [`SimulationController`]: start/pause/stop, step limits and delays
//! - [`setup`]: lattice building with the out-of-memory degrade ladder
//!
//! ## Guarantees
//!
//! 1. **Generations are atomic** - every cell computes `G + 1` from
//!    generation-`G` neighbours, and a fault rolls the whole lattice back
//! 2. **Results do not depend on the processor count** - for rules without
//!    hidden shared state
//! 3. **The barrier always releases** - a failing or panicking rule is
//!    reported, never left hanging

pub mod analysis;
mod color_buffer;
mod config;
mod controller;
mod error;
mod scheduler;
pub mod setup;
mod shard;
mod simulation;

pub use analysis::{
    Analysis, AnalysisId, ChangeHighlighter, GenerationSnapshot, PopulationHistory, PopulationLog,
};
pub use color_buffer::{cell_color, display_color, ColorBuffer};
pub use config::{max_cores, SchedulerConfig, SimulationConfig, DEFAULT_COLUMNS, DEFAULT_ROWS};
pub use controller::{RunState, SimulationController, StopReason};
pub use error::{Error, Result};
pub use scheduler::GenerationScheduler;
pub use setup::{BuildOutcome, BuildTier};
pub use shard::ShardPlan;
pub use simulation::Simulation;
