//! Lattica Core - cells, states and rules for discrete cellular automata
//!
//! This crate provides the data model the simulation engine runs on:
//! - Cell states (`CellState`) with binary, k-state and colour encodings
//! - Cells with a bounded, rewindable history (`Cell`)
//! - Lattices and neighbourhood topologies (`Lattice`, `Topology`, `Boundary`)
//! - The `Rule` trait, its per-cell `UpdateContext`, and built-in rules
//! - String-keyed registries for rules and topologies
//!
//! Scheduling generations across threads lives in `lattica-hub`; this
//! crate is single-generation and thread-agnostic apart from making
//! every cell safe to read while a neighbour is being advanced.

mod cell;
mod color;
mod coordinate;
mod error;
pub mod initial;
mod lattice;
mod params;
mod rule;
pub mod rules;
mod state;
pub mod topology;

pub use cell::{Cell, CellSnapshot};
pub use color::Rgb;
pub use coordinate::{Coordinate, Dimensions};
pub use error::{Error, Result};
pub use initial::InitialCondition;
pub use lattice::{Lattice, LatticeSpec};
pub use params::Params;
pub use rule::{default_color, Rule, RuleFactory, RuleRegistry, UpdateContext};
pub use state::{CellState, StateKind, StateValue, Tag, TagOwner};
pub use topology::{
    Boundary, Hexagonal, Line, Moore, Radius, Topology, TopologyFactory, TopologyRegistry,
    Triangular, VonNeumann,
};
