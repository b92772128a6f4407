//! Lattice - the flat cell array plus resolved neighbour lists
//!
//! A lattice is built once per run. Structural changes (size, topology,
//! the rule's required history) mean building a new lattice. Neighbour
//! lists are resolved at construction time, so the boundary policy is
//! fixed for the lattice's lifetime.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::state::CellState;
use crate::topology::{Boundary, Topology};
use crate::{Coordinate, Dimensions};
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;
use tracing::debug;

/// Shape and history parameters for building a [`Lattice`]
#[derive(Debug, Clone)]
pub struct LatticeSpec {
    pub dimensions: Dimensions,
    pub topology: Arc<dyn Topology>,
    pub boundary: Boundary,
    /// State every cell starts in
    pub initial: CellState,
    pub history_capacity: usize,
    pub required_generations: usize,
}

impl LatticeSpec {
    /// Rough heap footprint of the lattice these parameters describe
    pub fn estimated_bytes(&self) -> u128 {
        let bytes = |n: usize, size: usize| n as u128 * size as u128;
        let per_cell = bytes(1, size_of::<Cell>())
            + bytes(self.history_capacity, size_of::<CellState>())
            + bytes(1, size_of::<Vec<usize>>())
            + bytes(self.topology.max_neighbors(), size_of::<usize>());
        (self.dimensions.cell_count() as u128).saturating_mul(per_cell)
    }
}

/// All cells of one simulation run
pub struct Lattice {
    dimensions: Dimensions,
    boundary: Boundary,
    topology: Arc<dyn Topology>,
    cells: Vec<Cell>,
    /// Neighbour indices per cell, in topology order
    neighbors: Vec<Vec<usize>>,
}

impl Lattice {
    /// Build every cell and resolve its neighbours
    ///
    /// Allocation failure is reported as [`Error::InsufficientMemory`]
    /// rather than aborting, so callers can retry with a smaller lattice.
    pub fn build(spec: &LatticeSpec) -> Result<Self> {
        let dims = spec.dimensions;
        let count = dims.cell_count();
        let out_of_memory = || Error::InsufficientMemory { cells: count };

        let mut cells = Vec::new();
        cells.try_reserve_exact(count).map_err(|_| out_of_memory())?;
        let mut neighbors = Vec::new();
        neighbors.try_reserve_exact(count).map_err(|_| out_of_memory())?;

        for index in 0..count {
            let coordinate = dims.coordinate_of(index);
            cells.push(Cell::new(
                coordinate,
                index,
                spec.initial,
                spec.history_capacity,
                spec.required_generations,
            ));
            let resolved = spec
                .topology
                .neighbors(coordinate, dims, spec.boundary)
                .into_iter()
                .map(|c| dims.index_of(c))
                .collect();
            neighbors.push(resolved);
        }

        debug!(
            dimensions = %dims,
            topology = spec.topology.name(),
            boundary = ?spec.boundary,
            history_capacity = spec.history_capacity,
            "built lattice"
        );

        Ok(Self {
            dimensions: dims,
            boundary: spec.boundary,
            topology: spec.topology.clone(),
            cells,
            neighbors,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    /// The stable flat cell array, row-major
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cell_at(&self, coordinate: Coordinate) -> Option<&Cell> {
        if !self.dimensions.contains(coordinate) {
            return None;
        }
        self.cells.get(self.dimensions.index_of(coordinate))
    }

    /// Neighbour indices of the cell at `index`
    pub fn neighbor_indices(&self, index: usize) -> &[usize] {
        self.neighbors.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Neighbour cells of the cell at `index`
    pub fn neighbors(&self, index: usize) -> Vec<&Cell> {
        self.neighbor_indices(index)
            .iter()
            .filter_map(|&i| self.cells.get(i))
            .collect()
    }

    /// Generation of the lattice (every cell agrees between generations)
    pub fn generation(&self) -> u64 {
        self.cells.first().map(Cell::generation).unwrap_or(0)
    }

    /// Current state of every cell
    pub fn current_states(&self) -> Vec<CellState> {
        self.cells.iter().map(Cell::current_state).collect()
    }

    /// State of every cell at generation `g`, if all still retain it
    pub fn states_at(&self, g: u64) -> Option<Vec<CellState>> {
        self.cells.iter().map(|c| c.state(g)).collect()
    }

    /// Number of cells whose current state is not empty
    pub fn population(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| !c.current_state().is_empty())
            .count()
    }

    /// Check whether every cell can rewind one generation
    pub fn can_rewind(&self) -> bool {
        self.cells.iter().all(Cell::can_rewind)
    }

    /// Rewind every cell one generation
    ///
    /// All-or-nothing: returns false and changes nothing if any cell is at
    /// its rewind floor.
    pub fn rewind(&self) -> bool {
        if !self.can_rewind() {
            return false;
        }
        for cell in &self.cells {
            cell.remove_current_state();
        }
        true
    }

    /// Render current states one row per line
    ///
    /// Empty cells print as `.`, full cells as `#`, other values as their
    /// canonical integer modulo 10.
    pub fn to_grid_string(&self) -> String {
        let columns = self.dimensions.columns();
        let mut out = String::with_capacity(self.cells.len() + self.dimensions.rows());
        for (i, cell) in self.cells.iter().enumerate() {
            let state = cell.current_state();
            let ch = if state.is_empty() {
                '.'
            } else if state.is_full() {
                '#'
            } else {
                char::from_digit(state.to_int() % 10, 10).unwrap_or('?')
            };
            out.push(ch);
            if (i + 1) % columns == 0 {
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Debug for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lattice")
            .field("dimensions", &self.dimensions)
            .field("topology", &self.topology.name())
            .field("boundary", &self.boundary)
            .field("generation", &self.generation())
            .finish()
    }
}
