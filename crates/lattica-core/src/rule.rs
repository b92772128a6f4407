//! Rule trait and the per-cell update context
//!
//! A [`Rule`] is a pure function from a cell's neighbourhood at generation
//! `G` to the cell's state at `G + 1`. Rules are shared across worker
//! threads and invoked concurrently, so they must be `Send + Sync` and
//! must not write hidden rule-wide state from
//! [`calculate_new_state`](Rule::calculate_new_state) without their own
//! synchronization.
//!
//! Rules never read cells directly by "current state": the
//! [`UpdateContext`] pins every read to the generation being computed, so a
//! neighbour that another worker has already advanced still reports its
//! generation-`G` value.

use crate::cell::Cell;
use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::state::{CellState, StateValue};
use crate::Coordinate;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Read-only inputs for computing one cell's next state
pub struct UpdateContext<'a> {
    cell: &'a Cell,
    neighbors: &'a [&'a Cell],
    generation: u64,
}

impl<'a> UpdateContext<'a> {
    /// Context for advancing `cell` from `generation`
    pub fn new(cell: &'a Cell, neighbors: &'a [&'a Cell], generation: u64) -> Self {
        Self {
            cell,
            neighbors,
            generation,
        }
    }

    /// The generation being read (the result lands at `generation + 1`)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn coordinate(&self) -> Coordinate {
        self.cell.coordinate()
    }

    pub fn cell(&self) -> &Cell {
        self.cell
    }

    pub fn neighbors(&self) -> &[&'a Cell] {
        self.neighbors
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// This cell's state at the pinned generation
    pub fn state(&self) -> Result<CellState> {
        self.lookback(0)
    }

    /// This cell's state `steps` generations before the pinned one
    pub fn lookback(&self, steps: usize) -> Result<CellState> {
        read_at(self.cell, self.generation, steps)
    }

    /// Every neighbour's state at the pinned generation, in topology order
    pub fn neighbor_states(&self) -> Result<Vec<CellState>> {
        self.neighbor_lookback(0)
    }

    /// Every neighbour's state `steps` generations before the pinned one
    pub fn neighbor_lookback(&self, steps: usize) -> Result<Vec<CellState>> {
        self.neighbors
            .iter()
            .map(|n| read_at(n, self.generation, steps))
            .collect()
    }

    /// Count neighbours whose pinned-generation state satisfies `pred`
    pub fn count_neighbors(&self, pred: impl Fn(&CellState) -> bool) -> Result<usize> {
        let mut count = 0;
        for neighbor in self.neighbors {
            if pred(&read_at(neighbor, self.generation, 0)?) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Build a fault at this cell
    pub fn fault(&self, message: impl Into<String>) -> Error {
        Error::rule_fault(self.coordinate(), message)
    }
}

fn read_at(cell: &Cell, generation: u64, steps: usize) -> Result<CellState> {
    cell.lookback(generation, steps).ok_or_else(|| {
        Error::rule_fault(
            cell.coordinate(),
            format!(
                "state {} generation(s) before {} is not retained",
                steps, generation
            ),
        )
    })
}

/// A cellular automaton update rule
pub trait Rule: Send + Sync {
    /// Registry identifier
    fn name(&self) -> &str;

    /// Compute the next state of `ctx.cell()` from generation `ctx.generation()`
    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState>;

    /// How many generations of history the rule reads (at least 1)
    fn required_generations(&self) -> usize {
        1
    }

    /// A blank state of the encoding this rule works with
    fn compatible_state(&self) -> CellState;

    /// Display colour for `state`
    fn color(&self, state: &CellState) -> Rgb {
        default_color(state)
    }
}

/// Greyscale from white (empty) to black (full); colour states map to themselves
pub fn default_color(state: &CellState) -> Rgb {
    match state.value() {
        StateValue::Color(rgb) => rgb,
        _ => {
            let top = state.num_states().saturating_sub(1).max(1);
            Rgb::WHITE.lerp(Rgb::BLACK, state.to_int() as f32 / top as f32)
        }
    }
}

/// Constructor stored in a [`RuleRegistry`]
pub type RuleFactory = Arc<dyn Fn(&Params) -> Result<Arc<dyn Rule>> + Send + Sync>;

/// Maps rule identifiers to constructors
///
/// # Example
///
/// ```
/// use lattica_core::{Params, RuleRegistry};
///
/// let registry = RuleRegistry::with_builtin();
/// let rule = registry.create("life", &Params::new().with("rulestring", "B36/S23")).unwrap();
/// assert_eq!(rule.name(), "life");
/// assert!(registry.create("no-such-rule", &Params::new()).is_err());
/// ```
#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: IndexMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in rules
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::rules::register_builtin(&mut registry);
        registry
    }

    /// Register (or replace) a rule constructor
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Arc<dyn Rule>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Build the rule registered as `id`
    pub fn create(&self, id: &str, params: &Params) -> Result<Arc<dyn Rule>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| Error::UnknownRule(id.to_string()))?;
        factory(params)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateKind;

    struct Constant;

    impl Rule for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn calculate_new_state(&self, _ctx: &UpdateContext<'_>) -> Result<CellState> {
            Ok(CellState::binary(true))
        }

        fn compatible_state(&self) -> CellState {
            StateKind::Binary.blank()
        }
    }

    #[test]
    fn test_context_pins_generation() {
        let cell = Cell::new(Coordinate::new(0, 0), 0, CellState::binary(false), 4, 1);
        let neighbor = Cell::new(Coordinate::new(0, 1), 1, CellState::binary(true), 4, 1);
        // Neighbour advances first, as another shard may do
        neighbor.push_state(CellState::binary(false));

        let neighbors = [&neighbor];
        let ctx = UpdateContext::new(&cell, &neighbors, 0);
        assert_eq!(ctx.neighbor_states().unwrap(), vec![CellState::binary(true)]);
        assert_eq!(ctx.count_neighbors(|s| s.to_int() == 1).unwrap(), 1);
        assert_eq!(ctx.state().unwrap(), CellState::binary(false));
    }

    #[test]
    fn test_context_missing_history_is_fault() {
        let cell = Cell::new(Coordinate::new(0, 0), 0, CellState::binary(false), 2, 1);
        let ctx = UpdateContext::new(&cell, &[], 0);
        assert!(matches!(ctx.lookback(3), Err(Error::RuleFault { .. })));
    }

    #[test]
    fn test_default_color() {
        assert_eq!(default_color(&CellState::binary(false)), Rgb::WHITE);
        assert_eq!(default_color(&CellState::binary(true)), Rgb::BLACK);
        let mid = CellState::integer(1, 3).unwrap();
        assert_eq!(default_color(&mid), Rgb::new(128, 128, 128));
        let c = CellState::color(Rgb::new(1, 2, 3));
        assert_eq!(default_color(&c), Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = RuleRegistry::new();
        registry.register("constant", |_| Ok(Arc::new(Constant) as Arc<dyn Rule>));

        assert!(registry.contains("constant"));
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["constant"]);

        let rule = registry.create("constant", &Params::new()).unwrap();
        assert_eq!(rule.required_generations(), 1);
        assert!(matches!(
            registry.create("missing", &Params::new()),
            Err(Error::UnknownRule(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_builtin_registry_ids() {
        let registry = RuleRegistry::with_builtin();
        for id in ["majority", "life", "elementary", "cyclic", "second-order"] {
            assert!(registry.contains(id), "missing builtin {}", id);
        }
    }
}
