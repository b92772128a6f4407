//! Built-in rules
//!
//! A deliberately small catalogue. Each rule is registered in
//! [`RuleRegistry::with_builtin`](crate::RuleRegistry::with_builtin) under
//! the identifier returned by its `name()`.

mod cyclic;
mod elementary;
mod life;
mod majority;
mod second_order;

pub use cyclic::Cyclic;
pub use elementary::Elementary;
pub use life::Life;
pub use majority::Majority;
pub use second_order::SecondOrder;

use crate::rule::{Rule, RuleRegistry};
use std::sync::Arc;

/// Register every built-in rule in `registry`
pub fn register_builtin(registry: &mut RuleRegistry) {
    register_first_order(registry);

    // The base is resolved against first-order rules only, so wrappers
    // cannot nest
    registry.register(second_order::NAME, |params| {
        let mut bases = RuleRegistry::new();
        register_first_order(&mut bases);
        Ok(Arc::new(SecondOrder::from_params(params, &bases)?) as Arc<dyn Rule>)
    });
}

fn register_first_order(registry: &mut RuleRegistry) {
    registry.register(majority::NAME, |_| Ok(Arc::new(Majority) as Arc<dyn Rule>));
    registry.register(life::NAME, |params| {
        Ok(Arc::new(Life::from_params(params)?) as Arc<dyn Rule>)
    });
    registry.register(elementary::NAME, |params| {
        Ok(Arc::new(Elementary::from_params(params)?) as Arc<dyn Rule>)
    });
    registry.register(cyclic::NAME, |params| {
        Ok(Arc::new(Cyclic::from_params(params)?) as Arc<dyn Rule>)
    });
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving a rule over a small hand-built neighbourhood

    use crate::cell::Cell;
    use crate::rule::{Rule, UpdateContext};
    use crate::state::CellState;
    use crate::Coordinate;

    pub fn cell(state: CellState) -> Cell {
        Cell::new(Coordinate::new(0, 0), 0, state, 4, 2)
    }

    /// Next state of a cell in `center` surrounded by `neighbors`
    pub fn step(rule: &dyn Rule, center: CellState, neighbors: &[CellState]) -> CellState {
        let center = cell(center);
        let neighbors: Vec<Cell> = neighbors.iter().map(|s| cell(*s)).collect();
        let refs: Vec<&Cell> = neighbors.iter().collect();
        let ctx = UpdateContext::new(&center, &refs, 0);
        rule.calculate_new_state(&ctx).unwrap()
    }

    pub fn bits(values: &[u8]) -> Vec<CellState> {
        values.iter().map(|&v| CellState::binary(v == 1)).collect()
    }
}
