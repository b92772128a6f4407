//! Analysis trait - observers run after every generation
//!
//! The simulation hands each attached analysis a read-only
//! [`GenerationSnapshot`] once the generation barrier has released. An
//! analysis may read any cell's history and may tag or untag cells for
//! highlighting, but must not change cell states.

use lattica_core::{Lattice, Rule, TagOwner};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier of an attached analysis
///
/// Also used as the [`TagOwner`] for any tags the analysis places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub u32);

impl AnalysisId {
    pub fn tag_owner(self) -> TagOwner {
        TagOwner(self.0)
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Analysis({})", self.0)
    }
}

/// What an analysis sees after a generation
pub struct GenerationSnapshot<'a> {
    pub generation: u64,
    pub lattice: &'a Lattice,
    pub rule: &'a dyn Rule,
}

/// Observer attached to a simulation
///
/// While any analysis is attached the simulation refuses to rewind, since
/// an analysis accumulates per-generation results that a rewind would
/// silently invalidate.
pub trait Analysis: Send {
    /// Display name
    fn name(&self) -> &str;

    /// Called when attached, with the generation the lattice is at
    fn on_attach(&mut self, _id: AnalysisId, _snapshot: &GenerationSnapshot<'_>) {}

    /// Called once per generation, after every cell has advanced
    fn on_generation(&mut self, snapshot: &GenerationSnapshot<'_>);

    /// Called when detached; clear any tags placed here
    fn on_detach(&mut self, _lattice: &Lattice) {}
}

/// Shared log of `(generation, population)` pairs
pub type PopulationLog = Arc<Mutex<Vec<(u64, usize)>>>;

/// Records the number of non-empty cells each generation
#[derive(Debug, Default)]
pub struct PopulationHistory {
    log: PopulationLog,
}

impl PopulationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that stays readable after the analysis moves into a simulation
    pub fn log(&self) -> PopulationLog {
        Arc::clone(&self.log)
    }

    fn record(&self, generation: u64, population: usize) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((generation, population));
    }
}

impl Analysis for PopulationHistory {
    fn name(&self) -> &str {
        "population"
    }

    fn on_attach(&mut self, _id: AnalysisId, snapshot: &GenerationSnapshot<'_>) {
        self.record(snapshot.generation, snapshot.lattice.population());
    }

    fn on_generation(&mut self, snapshot: &GenerationSnapshot<'_>) {
        self.record(snapshot.generation, snapshot.lattice.population());
    }
}

/// Tags cells whose state changed in the latest generation
#[derive(Debug, Default)]
pub struct ChangeHighlighter {
    owner: Option<TagOwner>,
}

impl ChangeHighlighter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Analysis for ChangeHighlighter {
    fn name(&self) -> &str {
        "changes"
    }

    fn on_attach(&mut self, id: AnalysisId, _snapshot: &GenerationSnapshot<'_>) {
        self.owner = Some(id.tag_owner());
    }

    fn on_generation(&mut self, snapshot: &GenerationSnapshot<'_>) {
        let Some(owner) = self.owner else {
            return;
        };
        for cell in snapshot.lattice.cells() {
            let changed = cell
                .previous_state()
                .is_some_and(|previous| previous != cell.current_state());
            if changed {
                cell.tag(owner);
            } else {
                cell.untag(owner);
            }
        }
    }

    fn on_detach(&mut self, lattice: &Lattice) {
        if let Some(owner) = self.owner.take() {
            for cell in lattice.cells() {
                cell.untag(owner);
            }
        }
    }
}
