use crate::error::Result;
use crate::rule::{Rule, UpdateContext};
use crate::state::{CellState, StateKind};

pub(super) const NAME: &str = "majority";

/// Binary majority vote over the neighbourhood
///
/// A cell becomes whatever more than half its neighbours are; a tie keeps
/// the current state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Majority;

impl Rule for Majority {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState> {
        let alive = ctx.count_neighbors(|s| !s.is_empty())?;
        let dead = ctx.neighbor_count() - alive;
        Ok(match alive.cmp(&dead) {
            std::cmp::Ordering::Greater => CellState::binary(true),
            std::cmp::Ordering::Less => CellState::binary(false),
            std::cmp::Ordering::Equal => CellState::binary(!ctx.state()?.is_empty()),
        })
    }

    fn compatible_state(&self) -> CellState {
        StateKind::Binary.blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{bits, step};

    #[test]
    fn test_majority_wins() {
        let on = CellState::binary(true);
        let off = CellState::binary(false);
        assert_eq!(step(&Majority, off, &bits(&[1, 1, 1, 0])), on);
        assert_eq!(step(&Majority, on, &bits(&[0, 0, 1, 0])), off);
    }

    #[test]
    fn test_tie_keeps_current() {
        let on = CellState::binary(true);
        let off = CellState::binary(false);
        assert_eq!(step(&Majority, on, &bits(&[1, 1, 0, 0])), on);
        assert_eq!(step(&Majority, off, &bits(&[1, 1, 0, 0])), off);
        assert_eq!(step(&Majority, on, &[]), on);
    }
}
