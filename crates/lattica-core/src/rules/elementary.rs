use crate::error::Result;
use crate::params::Params;
use crate::rule::{Rule, UpdateContext};
use crate::state::{CellState, StateKind};

pub(super) const NAME: &str = "elementary";

/// Wolfram elementary rule on a radius-1 line neighbourhood
///
/// Expects exactly two neighbours, left then right, as the `line`
/// topology with radius 1 yields them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elementary {
    code: u8,
}

impl Elementary {
    pub fn new(code: u8) -> Self {
        Self { code }
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Ok(Self::new(params.parse_or(NAME, "code", 30u8)?))
    }
}

impl Rule for Elementary {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState> {
        let neighbors = ctx.neighbor_states()?;
        let [left, right] = neighbors.as_slice() else {
            return Err(ctx.fault(format!(
                "elementary rule needs 2 neighbours, got {}",
                neighbors.len()
            )));
        };
        let bit = |s: &CellState| u8::from(!s.is_empty());
        let index = (bit(left) << 2) | (bit(&ctx.state()?) << 1) | bit(right);
        Ok(CellState::binary((self.code >> index) & 1 == 1))
    }

    fn compatible_state(&self) -> CellState {
        StateKind::Binary.blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::rules::testing::{bits, cell, step};

    #[test]
    fn test_rule_30_table() {
        let rule = Elementary::new(30);
        // 111 110 101 100 011 010 001 000 -> 0 0 0 1 1 1 1 0
        let expected = [0, 1, 1, 1, 1, 0, 0, 0];
        for (index, &want) in expected.iter().enumerate() {
            let left = (index >> 2) & 1;
            let center = (index >> 1) & 1;
            let right = index & 1;
            let next = step(
                &rule,
                CellState::binary(center == 1),
                &bits(&[left as u8, right as u8]),
            );
            assert_eq!(next.to_int(), want, "pattern {:03b}", index);
        }
    }

    #[test]
    fn test_wrong_neighbourhood_is_fault() {
        let center = cell(CellState::binary(false));
        let ctx = UpdateContext::new(&center, &[], 0);
        assert!(matches!(
            Elementary::new(90).calculate_new_state(&ctx),
            Err(Error::RuleFault { .. })
        ));
    }

    #[test]
    fn test_code_param() {
        let params = Params::new().with("code", 110);
        assert_eq!(Elementary::from_params(&params).unwrap().code(), 110);
        assert!(Elementary::from_params(&Params::new().with("code", 256)).is_err());
    }
}
