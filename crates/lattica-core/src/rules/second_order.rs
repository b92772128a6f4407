use crate::error::{Error, Result};
use crate::params::Params;
use crate::rule::{Rule, RuleRegistry, UpdateContext};
use crate::state::CellState;
use std::fmt;
use std::sync::Arc;

pub(super) const NAME: &str = "second-order";

/// Reversible second-order wrapper around another rule
///
/// `next = (base(G) - state(G - 1)) mod k`, which for binary states is
/// `base XOR state(G - 1)`. Running the same rule with the two newest
/// generations swapped retraces the run backwards.
#[derive(Clone)]
pub struct SecondOrder {
    base: Arc<dyn Rule>,
}

impl SecondOrder {
    pub fn new(base: Arc<dyn Rule>) -> Self {
        Self { base }
    }

    /// Build from `base` (a rule id) plus the base rule's own parameters
    pub fn from_params(params: &Params, registry: &RuleRegistry) -> Result<Self> {
        let id = params.get("base").unwrap_or("majority");
        let base = registry.create(id, params).map_err(|e| match e {
            Error::UnknownRule(id) => Error::invalid_parameter(
                NAME,
                "base",
                format!("unknown base rule '{}'", id),
            ),
            other => other,
        })?;
        Ok(Self::new(base))
    }

    pub fn base(&self) -> &Arc<dyn Rule> {
        &self.base
    }
}

impl fmt::Debug for SecondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondOrder")
            .field("base", &self.base.name())
            .finish()
    }
}

impl Rule for SecondOrder {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState> {
        let proposed = self.base.calculate_new_state(ctx)?;
        let before = ctx.lookback(1)?;
        let value = difference_mod(proposed.to_int(), before.to_int(), proposed.num_states());
        proposed
            .with_int(value)
            .map_err(|e| ctx.fault(e.to_string()))
    }

    fn required_generations(&self) -> usize {
        self.base.required_generations().max(2)
    }

    fn compatible_state(&self) -> CellState {
        self.base.compatible_state()
    }

    fn color(&self, state: &CellState) -> crate::Rgb {
        self.base.color(state)
    }
}

/// `(a - b) mod k`, widened so large state counts cannot overflow
fn difference_mod(a: u32, b: u32, k: u32) -> u32 {
    let k = u64::from(k.max(1));
    let value = (u64::from(a) + k - u64::from(b) % k) % k;
    // value < k <= u32::MAX
    value as u32
}
