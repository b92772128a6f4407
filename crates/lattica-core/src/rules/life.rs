use crate::error::{Error, Result};
use crate::params::Params;
use crate::rule::{Rule, UpdateContext};
use crate::state::{CellState, StateKind};
use std::fmt;

pub(super) const NAME: &str = "life";

const DEFAULT_RULESTRING: &str = "B3/S23";

/// Outer-totalistic binary rule in `B.../S...` notation
///
/// Birth and survival counts are stored as bitmasks, so neighbourhoods of
/// up to 31 cells are supported.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Life {
    birth: u32,
    survive: u32,
}

impl Life {
    /// Conway's Game of Life (`B3/S23`)
    pub fn conway() -> Self {
        Self {
            birth: 1 << 3,
            survive: (1 << 2) | (1 << 3),
        }
    }

    /// Parse a rulestring such as `B36/S23`
    ///
    /// The two halves may come in either order and are case-insensitive.
    pub fn parse(rulestring: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::invalid_parameter(NAME, "rulestring", reason);
        let mut birth = None;
        let mut survive = None;
        for part in rulestring.trim().split('/') {
            let mut chars = part.trim().chars();
            let slot = match chars.next().map(|c| c.to_ascii_uppercase()) {
                Some('B') => &mut birth,
                Some('S') => &mut survive,
                _ => return Err(invalid("each half must start with B or S")),
            };
            if slot.is_some() {
                return Err(invalid("B or S given twice"));
            }
            let mut mask = 0u32;
            for c in chars {
                let n = c
                    .to_digit(10)
                    .ok_or_else(|| invalid("counts must be decimal digits"))?;
                mask |= 1 << n;
            }
            *slot = Some(mask);
        }
        match (birth, survive) {
            (Some(birth), Some(survive)) => Ok(Self { birth, survive }),
            _ => Err(invalid("expected both B and S halves")),
        }
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Self::parse(params.get("rulestring").unwrap_or(DEFAULT_RULESTRING))
    }
}

impl Default for Life {
    fn default() -> Self {
        Self::conway()
    }
}

impl fmt::Debug for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Life({})", self)
    }
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |mask: u32| -> String {
            (0u32..10)
                .filter(|n| mask & (1 << n) != 0)
                .filter_map(|n| char::from_digit(n, 10))
                .collect()
        };
        write!(f, "B{}/S{}", digits(self.birth), digits(self.survive))
    }
}

impl Rule for Life {
    fn name(&self) -> &str {
        NAME
    }

    fn calculate_new_state(&self, ctx: &UpdateContext<'_>) -> Result<CellState> {
        let alive = ctx.count_neighbors(|s| !s.is_empty())?;
        if alive >= 32 {
            return Err(ctx.fault(format!("{} live neighbours exceeds rule range", alive)));
        }
        let mask = if ctx.state()?.is_empty() {
            self.birth
        } else {
            self.survive
        };
        Ok(CellState::binary(mask & (1 << alive) != 0))
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
    fn test_parse_and_display() {
        assert_eq!(Life::parse("B3/S23").unwrap(), Life::conway());
        assert_eq!(Life::parse("s23/b3").unwrap(), Life::conway());
        assert_eq!(Life::parse("B36/S23").unwrap().to_string(), "B36/S23");
        assert_eq!(Life::parse("B/S").unwrap().to_string(), "B/S");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "B3", "X3/S23", "B3/B3", "B3x/S2"] {
            assert!(
                matches!(Life::parse(bad), Err(Error::InvalidRuleParameter { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_conway_transitions() {
        let life = Life::conway();
        let on = CellState::binary(true);
        let off = CellState::binary(false);
        assert_eq!(step(&life, off, &bits(&[1, 1, 1, 0, 0, 0, 0, 0])), on);
        assert_eq!(step(&life, off, &bits(&[1, 1, 0, 0, 0, 0, 0, 0])), off);
        assert_eq!(step(&life, on, &bits(&[1, 1, 0, 0, 0, 0, 0, 0])), on);
        assert_eq!(step(&life, on, &bits(&[1, 1, 1, 1, 0, 0, 0, 0])), off);
        assert_eq!(step(&life, on, &bits(&[1, 0, 0, 0, 0, 0, 0, 0])), off);
    }

    #[test]
    fn test_from_params_default() {
        assert_eq!(Life::from_params(&Params::new()).unwrap(), Life::conway());
    }
}
