//! Neighbourhood topologies and boundary policies
//!
//! A [`Topology`] maps a cell coordinate to the coordinates of its
//! neighbours. Out-of-range positions are resolved by the lattice's
//! [`Boundary`] policy, which is fixed when the lattice is built.
//!
//! # Built-in topologies
//!
//! | Id | Neighbours |
//! |---|---|
//! | `square-4` | von Neumann: N, W, E, S |
//! | `square-8` | Moore: the 8 surrounding cells |
//! | `hexagonal` | 6, odd rows shifted right by half a cell |
//! | `triangular` | 3, triangle orientation alternates with `row + column` parity |
//! | `radius` | square of side `2r + 1` around the cell (param `radius`) |
//! | `line` | 1-D, `r` cells each side (param `radius`) |

use crate::error::{Error, Result};
use crate::params::Params;
use crate::{Coordinate, Dimensions};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How positions beyond the lattice edge are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Boundary {
    /// Toroidal: leaving one edge re-enters at the opposite edge
    #[default]
    Wrap,
    /// Mirror: a position `k` cells past an edge maps to the cell `k - 1`
    /// cells inside it, so the edge cell is its own outer neighbour
    Reflect,
}

impl Boundary {
    /// Resolve a possibly out-of-range index on an axis of length `len`
    pub fn resolve(&self, index: isize, len: usize) -> usize {
        let n = len as isize;
        match self {
            Boundary::Wrap => index.rem_euclid(n) as usize,
            Boundary::Reflect => {
                let mirrored = if index < 0 {
                    -index - 1
                } else if index >= n {
                    2 * n - index - 1
                } else {
                    index
                };
                mirrored.clamp(0, n - 1) as usize
            }
        }
    }

    /// Resolve a row/column offset from `origin`
    pub fn offset(&self, origin: Coordinate, dr: isize, dc: isize, dims: Dimensions) -> Coordinate {
        Coordinate::new(
            self.resolve(origin.row as isize + dr, dims.rows()),
            self.resolve(origin.column as isize + dc, dims.columns()),
        )
    }
}

/// Neighbour lookup for one lattice geometry
pub trait Topology: Send + Sync + fmt::Debug {
    /// Registry identifier
    fn name(&self) -> &str;

    /// Neighbour coordinates of `coordinate`, in a stable order
    ///
    /// With [`Boundary::Reflect`] the list may repeat a cell or include
    /// the cell itself; rules see exactly what is returned.
    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate>;

    /// Upper bound on neighbours per cell, used for memory estimates
    fn max_neighbors(&self) -> usize;
}

fn from_offsets(
    offsets: &[(isize, isize)],
    coordinate: Coordinate,
    dims: Dimensions,
    boundary: Boundary,
) -> Vec<Coordinate> {
    offsets
        .iter()
        .map(|&(dr, dc)| boundary.offset(coordinate, dr, dc, dims))
        .collect()
}

/// Four orthogonal neighbours
#[derive(Debug, Clone, Copy, Default)]
pub struct VonNeumann;

impl Topology for VonNeumann {
    fn name(&self) -> &str {
        "square-4"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        from_offsets(&[(-1, 0), (0, -1), (0, 1), (1, 0)], coordinate, dims, boundary)
    }

    fn max_neighbors(&self) -> usize {
        4
    }
}

/// Eight surrounding neighbours
#[derive(Debug, Clone, Copy, Default)]
pub struct Moore;

impl Topology for Moore {
    fn name(&self) -> &str {
        "square-8"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        from_offsets(
            &[(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)],
            coordinate,
            dims,
            boundary,
        )
    }

    fn max_neighbors(&self) -> usize {
        8
    }
}

/// Hexagonal tiling stored as offset rows
#[derive(Debug, Clone, Copy, Default)]
pub struct Hexagonal;

impl Topology for Hexagonal {
    fn name(&self) -> &str {
        "hexagonal"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        let offsets: &[(isize, isize)] = if coordinate.row % 2 == 0 {
            &[(-1, -1), (-1, 0), (0, -1), (0, 1), (1, -1), (1, 0)]
        } else {
            &[(-1, 0), (-1, 1), (0, -1), (0, 1), (1, 0), (1, 1)]
        };
        from_offsets(offsets, coordinate, dims, boundary)
    }

    fn max_neighbors(&self) -> usize {
        6
    }
}

/// Triangular tiling; each triangle shares an edge with three others
#[derive(Debug, Clone, Copy, Default)]
pub struct Triangular;

impl Topology for Triangular {
    fn name(&self) -> &str {
        "triangular"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        // Upward triangles share their base with the row below
        let vertical = if (coordinate.row + coordinate.column) % 2 == 0 { 1 } else { -1 };
        from_offsets(&[(0, -1), (0, 1), (vertical, 0)], coordinate, dims, boundary)
    }

    fn max_neighbors(&self) -> usize {
        3
    }
}

/// Every cell within Chebyshev distance `radius`
#[derive(Debug, Clone, Copy)]
pub struct Radius {
    pub radius: usize,
}

impl Topology for Radius {
    fn name(&self) -> &str {
        "radius"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        let r = self.radius as isize;
        let mut out = Vec::with_capacity(self.max_neighbors());
        for dr in -r..=r {
            for dc in -r..=r {
                if dr != 0 || dc != 0 {
                    out.push(boundary.offset(coordinate, dr, dc, dims));
                }
            }
        }
        out
    }

    fn max_neighbors(&self) -> usize {
        let side = self.radius.saturating_mul(2).saturating_add(1);
        side.saturating_mul(side) - 1
    }
}

/// One-dimensional neighbourhood, `radius` cells each side, left to right
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub radius: usize,
}

impl Topology for Line {
    fn name(&self) -> &str {
        "line"
    }

    fn neighbors(&self, coordinate: Coordinate, dims: Dimensions, boundary: Boundary) -> Vec<Coordinate> {
        let r = self.radius as isize;
        (-r..=r)
            .filter(|&dc| dc != 0)
            .map(|dc| boundary.offset(coordinate, 0, dc, dims))
            .collect()
    }

    fn max_neighbors(&self) -> usize {
        self.radius.saturating_mul(2)
    }
}

/// Constructor stored in a [`TopologyRegistry`]
pub type TopologyFactory = Arc<dyn Fn(&Params) -> Result<Arc<dyn Topology>> + Send + Sync>;

/// Maps topology identifiers to constructors
#[derive(Clone, Default)]
pub struct TopologyRegistry {
    factories: IndexMap<String, TopologyFactory>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in topologies
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("square-4", |_| Ok(Arc::new(VonNeumann) as Arc<dyn Topology>));
        registry.register("square-8", |_| Ok(Arc::new(Moore) as Arc<dyn Topology>));
        registry.register("hexagonal", |_| Ok(Arc::new(Hexagonal) as Arc<dyn Topology>));
        registry.register("triangular", |_| Ok(Arc::new(Triangular) as Arc<dyn Topology>));
        registry.register("radius", |params| {
            let radius = positive_radius("radius", params)?;
            Ok(Arc::new(Radius { radius }) as Arc<dyn Topology>)
        });
        registry.register("line", |params| {
            let radius = positive_radius("line", params)?;
            Ok(Arc::new(Line { radius }) as Arc<dyn Topology>)
        });
        registry
    }

    /// Register (or replace) a topology constructor
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Arc<dyn Topology>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Build the topology registered as `id`
    pub fn create(&self, id: &str, params: &Params) -> Result<Arc<dyn Topology>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| Error::UnknownTopology(id.to_string()))?;
        factory(params)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for TopologyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Largest radius accepted by the `radius` and `line` constructors
pub const MAX_RADIUS: usize = 1024;

fn positive_radius(owner: &str, params: &Params) -> Result<usize> {
    let radius = params.parse_or(owner, "radius", 1usize)?;
    if radius == 0 {
        return Err(Error::invalid_parameter(owner, "radius", "must be at least 1"));
    }
    if radius > MAX_RADIUS {
        return Err(Error::invalid_parameter(
            owner,
            "radius",
            format!("must be at most {}", MAX_RADIUS),
        ));
    }
    Ok(radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(rows: usize, columns: usize) -> Dimensions {
        Dimensions::new(rows, columns).unwrap()
    }

    #[test]
    fn test_wrap_resolve() {
        assert_eq!(Boundary::Wrap.resolve(-1, 5), 4);
        assert_eq!(Boundary::Wrap.resolve(5, 5), 0);
        assert_eq!(Boundary::Wrap.resolve(-6, 5), 4);
        assert_eq!(Boundary::Wrap.resolve(2, 5), 2);
    }

    #[test]
    fn test_reflect_resolve() {
        assert_eq!(Boundary::Reflect.resolve(-1, 5), 0);
        assert_eq!(Boundary::Reflect.resolve(-2, 5), 1);
        assert_eq!(Boundary::Reflect.resolve(5, 5), 4);
        assert_eq!(Boundary::Reflect.resolve(6, 5), 3);
        assert_eq!(Boundary::Reflect.resolve(-9, 2), 1);
        assert_eq!(Boundary::Reflect.resolve(3, 1), 0);
    }

    #[test]
    fn test_von_neumann_wrap_corner() {
        let n = VonNeumann.neighbors(Coordinate::new(0, 0), dims(3, 3), Boundary::Wrap);
        assert_eq!(
            n,
            vec![
                Coordinate::new(2, 0),
                Coordinate::new(0, 2),
                Coordinate::new(0, 1),
                Coordinate::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_von_neumann_reflect_corner_includes_self() {
        let n = VonNeumann.neighbors(Coordinate::new(0, 0), dims(3, 3), Boundary::Reflect);
        assert_eq!(n.iter().filter(|c| **c == Coordinate::new(0, 0)).count(), 2);
    }

    #[test]
    fn test_moore_interior() {
        let n = Moore.neighbors(Coordinate::new(1, 1), dims(3, 3), Boundary::Wrap);
        assert_eq!(n.len(), 8);
        assert!(!n.contains(&Coordinate::new(1, 1)));
    }

    #[test]
    fn test_hexagonal_parity() {
        let even = Hexagonal.neighbors(Coordinate::new(2, 2), dims(6, 6), Boundary::Wrap);
        assert!(even.contains(&Coordinate::new(1, 1)));
        assert!(!even.contains(&Coordinate::new(1, 3)));

        let odd = Hexagonal.neighbors(Coordinate::new(3, 2), dims(6, 6), Boundary::Wrap);
        assert!(odd.contains(&Coordinate::new(2, 3)));
        assert!(!odd.contains(&Coordinate::new(2, 1)));
        assert_eq!(odd.len(), 6);
    }

    #[test]
    fn test_triangular_orientation() {
        let up = Triangular.neighbors(Coordinate::new(2, 2), dims(5, 5), Boundary::Wrap);
        assert_eq!(up[2], Coordinate::new(3, 2));
        let down = Triangular.neighbors(Coordinate::new(2, 3), dims(5, 5), Boundary::Wrap);
        assert_eq!(down[2], Coordinate::new(1, 3));
    }

    #[test]
    fn test_radius_count() {
        let topology = Radius { radius: 2 };
        let n = topology.neighbors(Coordinate::new(5, 5), dims(11, 11), Boundary::Wrap);
        assert_eq!(n.len(), 24);
        assert_eq!(topology.max_neighbors(), 24);
    }

    #[test]
    fn test_line_order() {
        let n = Line { radius: 1 }.neighbors(Coordinate::column(0), dims(1, 7), Boundary::Wrap);
        assert_eq!(n, vec![Coordinate::column(6), Coordinate::column(1)]);
    }

    #[test]
    fn test_registry() {
        let registry = TopologyRegistry::with_builtin();
        let t = registry.create("radius", &Params::new().with("radius", 3)).unwrap();
        assert_eq!(t.max_neighbors(), 48);
        assert!(matches!(
            registry.create("line", &Params::new().with("radius", 0)),
            Err(Error::InvalidRuleParameter { .. })
        ));
        assert!(matches!(
            registry.create("penrose", &Params::new()),
            Err(Error::UnknownTopology(_))
        ));
        assert_eq!(registry.ids().count(), 6);
    }

    #[test]
    fn test_registry_rejects_oversized_radius() {
        let registry = TopologyRegistry::with_builtin();
        for id in ["radius", "line"] {
            assert!(matches!(
                registry.create(id, &Params::new().with("radius", 1u64 << 33)),
                Err(Error::InvalidRuleParameter { .. })
            ));
        }
        let t = registry
            .create("radius", &Params::new().with("radius", MAX_RADIUS))
            .unwrap();
        assert_eq!(t.max_neighbors(), (2 * MAX_RADIUS + 1).pow(2) - 1);
    }

    #[test]
    fn test_max_neighbors_saturates() {
        assert_eq!(Radius { radius: usize::MAX }.max_neighbors(), usize::MAX - 1);
        assert_eq!(Line { radius: usize::MAX }.max_neighbors(), usize::MAX);
    }
}
