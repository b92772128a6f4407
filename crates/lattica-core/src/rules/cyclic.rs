use crate::error::{Error, Result};
use crate::params::Params;
use crate::rule::{Rule, UpdateContext};
use crate::state::{CellState, StateKind};

pub(super) const NAME: &str = "cyclic";

/// k-state cyclic automaton
///
/// A cell in state `s` advances to `(s + 1) mod k` when at least
/// `threshold` neighbours are already in that successor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cyclic {
    states: u32,
    threshold: usize,
}

impl Cyclic {
    pub fn new(states: u32, threshold: usize) -> Result<Self> {
        if states < 2 {
            return Err(Error::invalid_parameter(NAME, "states", "must be at least 2"));
        }
        if threshold == 0 {
            return Err(Error::invalid_parameter(NAME, "threshold", "must be at least 1"));
        }
        Ok(Self { states, threshold })
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::new(
            params.parse_or(NAME, "states", 14u32)?,
            params.parse_or(NAME, "threshold", 1usize)?,
        )
    }

    pub fn states(&self) -> u32 {
        self.states
    }
}

impl Rule for Cyclic {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState> {
        let current = ctx.state()?;
        let successor = (current.to_int() + 1) % self.states;
        let matching = ctx.count_neighbors(|s| s.to_int() == successor)?;
        let next = if matching >= self.threshold {
            successor
        } else {
            current.to_int()
        };
        CellState::integer(next, self.states).map_err(|e| ctx.fault(e.to_string()))
    }

    fn compatible_state(&self) -> CellState {
        StateKind::Integer {
            states: self.states,
        }
        .blank()
    }
}
