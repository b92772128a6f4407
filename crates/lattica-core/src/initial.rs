//! Initial conditions applied to a freshly built lattice

use crate::lattice::Lattice;
use crate::state::{CellState, StateValue};
use crate::{Coordinate, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How cells are populated before generation 0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum InitialCondition {
    /// Every cell empty
    #[default]
    Blank,
    /// Every cell full
    Full,
    /// Empty except the centre cell, which is full
    SingleSeed,
    /// Each cell is non-empty with probability `density`
    Random { density: f64, seed: u64 },
}

impl InitialCondition {
    /// Overwrite every retained state of every cell
    ///
    /// `blank` fixes the state encoding (usually the rule's compatible state).
    pub fn apply(&self, lattice: &Lattice, blank: CellState) {
        let empty = blank.empty();
        match *self {
            InitialCondition::Blank => fill(lattice, |_| empty),
            InitialCondition::Full => fill(lattice, |_| empty.full()),
            InitialCondition::SingleSeed => {
                let dims = lattice.dimensions();
                let centre = Coordinate::new(dims.rows() / 2, dims.columns() / 2);
                fill(lattice, |c| if c == centre { empty.full() } else { empty });
            }
            InitialCondition::Random { density, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let density = density.clamp(0.0, 1.0);
                for cell in lattice.cells() {
                    let state = if rng.random::<f64>() < density {
                        random_filled(&mut rng, empty)
                    } else {
                        empty
                    };
                    cell.fill_history(state);
                }
            }
        }
    }
}

fn fill(lattice: &Lattice, state_for: impl Fn(Coordinate) -> CellState) {
    for cell in lattice.cells() {
        cell.fill_history(state_for(cell.coordinate()));
    }
}

/// A uniformly chosen non-empty state of the same kind as `template`
fn random_filled(rng: &mut StdRng, template: CellState) -> CellState {
    match template.value() {
        StateValue::Binary(_) => CellState::binary(true),
        StateValue::Integer { states, .. } if states > 1 => template
            .with_int(rng.random_range(1..states))
            .unwrap_or(template),
        StateValue::Integer { .. } => template,
        StateValue::Color(_) => {
            let rgb = Rgb::new(rng.random(), rng.random(), rng.random());
            if rgb == Rgb::BLACK {
                CellState::color(Rgb::WHITE)
            } else {
                CellState::color(rgb)
            }
        }
    }
}
