//! Lattice coordinates and dimensions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable position of a cell on the lattice
///
/// One-dimensional lattices use `row == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: usize,
    pub column: usize,
}

impl Coordinate {
    /// Create a new coordinate
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Coordinate on a one-dimensional lattice
    pub fn column(column: usize) -> Self {
        Self { row: 0, column }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Size of a lattice in rows and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    rows: usize,
    columns: usize,
}

impl Dimensions {
    /// Create dimensions, rejecting empty lattices
    pub fn new(rows: usize, columns: usize) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(Error::InvalidDimensions { rows, columns });
        }
        Ok(Self { rows, columns })
    }

    /// A single row of `columns` cells
    pub fn line(columns: usize) -> Result<Self> {
        Self::new(1, columns)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    /// Check if this is a one-dimensional lattice
    pub fn is_line(&self) -> bool {
        self.rows == 1
    }

    /// Row-major linear index of a coordinate
    pub fn index_of(&self, coordinate: Coordinate) -> usize {
        coordinate.row * self.columns + coordinate.column
    }

    /// Coordinate of a row-major linear index
    pub fn coordinate_of(&self, index: usize) -> Coordinate {
        Coordinate::new(index / self.columns, index % self.columns)
    }

    /// Check if a coordinate lies on the lattice
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        coordinate.row < self.rows && coordinate.column < self.columns
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}
