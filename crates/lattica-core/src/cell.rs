//! Cell - one lattice position and its rolling state history
//!
//! A cell owns a [`FiniteHistory`] of its states, its immutable
//! [`Coordinate`], and its generation counter. All three change together
//! under a single lock, so a concurrent reader never sees a new state with
//! an old generation (or the reverse).
//!
//! # History layout
//!
//! A freshly built cell is seeded with `required_generations` copies of its
//! initial state so rules that look back several generations have input
//! from the very first update. The newest entry is always the state at
//! [`generation()`](Cell::generation); entry `k` from the newest end is the
//! state at `generation - k`.
//!
//! # Rewind floor
//!
//! Rewinding never shrinks the history to `required_generations` entries
//! or below, and never takes the generation below zero. Hitting the floor
//! is a silent no-op, reported only through the `bool` return value.

use crate::error::{Error, Result};
use crate::rule::{Rule, UpdateContext};
use crate::state::{CellState, TagOwner};
use crate::Coordinate;
use lattica_history::FiniteHistory;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Consistent view of a cell's timeline at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSnapshot {
    pub coordinate: Coordinate,
    pub generation: u64,
    pub current: CellState,
    pub previous: Option<CellState>,
}

#[derive(Debug)]
struct Timeline {
    generation: u64,
    history: FiniteHistory<CellState>,
    /// Always equal to the newest history entry
    current: CellState,
    /// Always equal to the second-newest history entry
    previous: Option<CellState>,
    /// Entry pushed out by the latest update, kept so the update can be undone
    evicted: Option<CellState>,
}

impl Timeline {
    fn refresh_cache(&mut self) {
        if let Some(newest) = self.history.newest() {
            self.current = *newest;
        }
        self.previous = self.history.back(1).copied();
    }
}

/// One position on the lattice
#[derive(Debug)]
pub struct Cell {
    coordinate: Coordinate,
    /// Row-major index into the lattice's flat cell array
    index: usize,
    required_generations: usize,
    timeline: RwLock<Timeline>,
}

impl Cell {
    /// Create a cell at generation 0
    ///
    /// `required_generations` is raised to at least 1, and
    /// `history_capacity` to at least `required_generations + 1` so the
    /// pre-update state stays readable after the cell advances.
    pub fn new(
        coordinate: Coordinate,
        index: usize,
        initial: CellState,
        history_capacity: usize,
        required_generations: usize,
    ) -> Self {
        let required = required_generations.max(1);
        let capacity = history_capacity.max(required + 1);
        let history = FiniteHistory::filled(capacity, initial, required);
        let mut timeline = Timeline {
            generation: 0,
            history,
            current: initial,
            previous: None,
            evicted: None,
        };
        timeline.refresh_cache();

        Self {
            coordinate,
            index,
            required_generations: required,
            timeline: RwLock::new(timeline),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Timeline> {
        self.timeline.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Timeline> {
        self.timeline.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lattice position, fixed for the cell's lifetime
    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Row-major index of this cell on its lattice
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of generations the rule reads when updating this cell
    pub fn required_generations(&self) -> usize {
        self.required_generations
    }

    /// Generation of the newest state
    ///
    /// Between scheduler runs every cell on a lattice agrees on this value.
    /// While a generation is in flight a cell may already be one ahead of
    /// its neighbours.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// State at [`generation()`](Self::generation)
    pub fn current_state(&self) -> CellState {
        self.read().current
    }

    /// The state one generation back, if retained
    pub fn previous_state(&self) -> Option<CellState> {
        self.read().previous
    }

    /// Read generation, current and previous state atomically
    pub fn snapshot(&self) -> CellSnapshot {
        let timeline = self.read();
        CellSnapshot {
            coordinate: self.coordinate,
            generation: timeline.generation,
            current: timeline.current,
            previous: timeline.previous,
        }
    }

    /// The state at generation `g`
    ///
    /// Returns `None` when `g` is in the future or has been evicted.
    pub fn state(&self, g: u64) -> Option<CellState> {
        self.lookback(g, 0)
    }

    /// The state `steps` generations before generation `from`
    ///
    /// Unlike [`state`](Self::state) this can reach the seeded entries that
    /// stand in for generations before 0, which is what multi-generation
    /// rules need on their first updates.
    pub fn lookback(&self, from: u64, steps: usize) -> Option<CellState> {
        let timeline = self.read();
        let ahead = timeline.generation.checked_sub(from)?;
        let back = usize::try_from(ahead).ok()?.checked_add(steps)?;
        timeline.history.back(back).copied()
    }

    /// Compute and append the next state using `rule`
    ///
    /// The rule sees this cell and its neighbours as of the cell's current
    /// generation. Any error from the rule is reported as a
    /// [`Error::RuleFault`] at this cell's coordinate and leaves the cell
    /// untouched.
    pub fn update_state(&self, rule: &dyn Rule, neighbors: &[&Cell]) -> Result<CellState> {
        let generation = self.generation();
        let ctx = UpdateContext::new(self, neighbors, generation);
        let next = rule.calculate_new_state(&ctx).map_err(|e| match e {
            fault @ Error::RuleFault { .. } => fault,
            other => Error::rule_fault(self.coordinate, other.to_string()),
        })?;
        Ok(self.push_state(next))
    }

    /// Append `state` as the next generation
    ///
    /// Any tag on the current state carries over to the new one. Returns
    /// the state as stored.
    pub fn push_state(&self, state: CellState) -> CellState {
        let mut timeline = self.write();
        let stored = state.with_tag_from(&timeline.current);
        timeline.evicted = timeline.history.push(stored);
        timeline.previous = Some(timeline.current);
        timeline.current = stored;
        timeline.generation += 1;
        stored
    }

    /// Check whether one more rewind is possible
    pub fn can_rewind(&self) -> bool {
        let timeline = self.read();
        timeline.generation > 0 && timeline.history.len() > self.required_generations
    }

    /// Number of rewinds currently possible
    pub fn rewind_depth(&self) -> usize {
        let timeline = self.read();
        let by_history = timeline.history.len() - self.required_generations.min(timeline.history.len());
        let by_generation = usize::try_from(timeline.generation).unwrap_or(usize::MAX);
        by_history.min(by_generation)
    }

    /// Rewind one generation
    ///
    /// Drops the newest state and decrements the generation. Returns false
    /// (and changes nothing) at the rewind floor.
    pub fn remove_current_state(&self) -> bool {
        let mut timeline = self.write();
        if timeline.generation == 0 || timeline.history.len() <= self.required_generations {
            return false;
        }
        timeline.history.pop_newest();
        timeline.evicted = None;
        timeline.refresh_cache();
        timeline.generation -= 1;
        true
    }

    /// Undo the latest update exactly
    ///
    /// Like [`remove_current_state`](Self::remove_current_state), but if
    /// that update evicted the oldest entry, the entry is put back, so the
    /// cell keeps the rewind depth it had before the update. Used to
    /// discard a generation that failed part-way.
    pub fn undo_update(&self) -> bool {
        let mut timeline = self.write();
        if timeline.generation == 0 || timeline.history.len() <= self.required_generations {
            return false;
        }
        timeline.history.pop_newest();
        if let Some(evicted) = timeline.evicted.take() {
            timeline.history.restore_oldest(evicted);
        }
        timeline.refresh_cache();
        timeline.generation -= 1;
        true
    }

    /// Drop the newest state without touching the generation
    ///
    /// Used to undo a history mutation that should not move the logical
    /// timeline. Returns false at the rewind floor.
    pub fn roll_back_states(&self) -> bool {
        let mut timeline = self.write();
        if timeline.history.len() <= self.required_generations {
            return false;
        }
        timeline.history.pop_newest();
        timeline.evicted = None;
        timeline.refresh_cache();
        true
    }

    /// Replace the current state in place
    pub fn reset_state(&self, state: CellState) {
        let mut timeline = self.write();
        if let Some(newest) = timeline.history.back_mut(0) {
            *newest = state;
        }
        timeline.current = state;
    }

    /// Replace the previous state in place
    ///
    /// Returns false if no previous state is retained.
    pub fn reset_previous_state(&self, state: CellState) -> bool {
        let mut timeline = self.write();
        match timeline.history.back_mut(1) {
            Some(previous) => {
                *previous = state;
                timeline.previous = Some(state);
                true
            }
            None => false,
        }
    }

    /// Replace every retained state, e.g. when applying an initial condition
    pub fn fill_history(&self, state: CellState) {
        let mut timeline = self.write();
        let len = timeline.history.len();
        for steps in 0..len {
            if let Some(entry) = timeline.history.back_mut(steps) {
                *entry = state;
            }
        }
        timeline.evicted = None;
        timeline.refresh_cache();
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Tag the current state
    pub fn tag(&self, owner: TagOwner) {
        let mut timeline = self.write();
        timeline.current.set_tag(owner);
        if let Some(newest) = timeline.history.back_mut(0) {
            newest.set_tag(owner);
        }
    }

    /// Remove `owner`'s tag from the current state
    pub fn untag(&self, owner: TagOwner) -> bool {
        let mut timeline = self.write();
        let removed = timeline.current.clear_tag(owner);
        if let Some(newest) = timeline.history.back_mut(0) {
            newest.clear_tag(owner);
        }
        removed
    }

    pub fn is_tagged(&self) -> bool {
        self.read().current.is_tagged()
    }

    // ========================================================================
    // History inspection
    // ========================================================================

    pub fn history_len(&self) -> usize {
        self.read().history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.read().history.capacity()
    }

    /// Mean canonical integer value over the last `window` generations
    ///
    /// Only generations that actually ran (0 onward) are averaged. Returns
    /// `None` for a zero window.
    pub fn running_average(&self, window: usize) -> Option<f64> {
        let timeline = self.read();
        let ran = usize::try_from(timeline.generation.saturating_add(1)).unwrap_or(usize::MAX);
        let count = window.min(ran).min(timeline.history.len());
        if count == 0 {
            return None;
        }
        let sum: f64 = timeline
            .history
            .recent(count)
            .map(|s| s.to_int() as f64)
            .sum();
        Some(sum / count as f64)
    }
}
