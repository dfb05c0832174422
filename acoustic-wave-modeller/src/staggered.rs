//! Typed containers for the three node families of the staggered grid.
//!
//! Pressure lives on the grid nodes, `Vx` half a cell to the right of them
//! and `Vz` half a cell below. Each family gets its own marker type, so a
//! pressure array cannot be handed to code expecting a velocity array, and
//! the half-cell offsets live in one place instead of in every index
//! expression.

use std::marker::PhantomData;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::grid::{Grid, GridPosition};
use crate::interpolation::Bilinear;

/// Node family of a staggered field.
pub trait Staggering: Send + Sync {
    /// Field role used in logs and divergence reports.
    const ROLE: &'static str;
    /// Offset of node (0, 0) from grid node (0, 0), in cells.
    const OFFSET: (f64, f64);

    fn shape(grid: &Grid) -> (usize, usize);
}

/// Grid nodes (pressure, bulk modulus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Centered;

/// Nodes at (i + 1/2, k) (horizontal particle velocity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XFace;

/// Nodes at (i, k + 1/2) (vertical particle velocity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZFace;

impl Staggering for Centered {
    const ROLE: &'static str = "pressure";
    const OFFSET: (f64, f64) = (0.0, 0.0);

    fn shape(grid: &Grid) -> (usize, usize) {
        (grid.nx, grid.nz)
    }
}

impl Staggering for XFace {
    const ROLE: &'static str = "vx";
    const OFFSET: (f64, f64) = (0.5, 0.0);

    fn shape(grid: &Grid) -> (usize, usize) {
        (grid.nx - 1, grid.nz)
    }
}

impl Staggering for ZFace {
    const ROLE: &'static str = "vz";
    const OFFSET: (f64, f64) = (0.0, 0.5);

    fn shape(grid: &Grid) -> (usize, usize) {
        (grid.nx, grid.nz - 1)
    }
}

/// How intra-step node updates are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    Serial,
    #[default]
    Parallel,
}

/// A scalar field on one node family. Reads outside the field return zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StaggeredField<L> {
    data: Array2<f64>,
    _location: PhantomData<L>,
}

impl<L: Staggering> StaggeredField<L> {
    pub fn zeros(grid: &Grid) -> Self {
        Self::wrap(Array2::zeros(L::shape(grid)))
    }

    /// Builds a field by evaluating `f` at every node's grid coordinates.
    pub fn from_positions(grid: &Grid, f: impl Fn(GridPosition) -> f64) -> Self {
        Self::wrap(Array2::from_shape_fn(L::shape(grid), |(i, k)| {
            f(Self::node_position(i, k))
        }))
    }

    /// Wraps an existing array after checking it matches this family's shape.
    pub fn from_array(grid: &Grid, data: Array2<f64>) -> Result<Self, ConfigurationError> {
        let expected = L::shape(grid);
        if data.dim() != expected {
            return Err(ConfigurationError::ShapeMismatch {
                what: L::ROLE,
                expected,
                got: data.dim(),
            });
        }
        Ok(Self::wrap(data))
    }

    fn wrap(data: Array2<f64>) -> Self {
        StaggeredField {
            data,
            _location: PhantomData,
        }
    }

    /// Grid coordinates of node (i, k) of this family.
    pub fn node_position(i: usize, k: usize) -> GridPosition {
        GridPosition::new(i as f64 + L::OFFSET.0, k as f64 + L::OFFSET.1)
    }

    /// True when `p` lies within this family's node span, so every bilinear
    /// corner around it exists.
    pub fn covers(grid: &Grid, p: GridPosition) -> bool {
        let (n0, n1) = L::shape(grid);
        let (x, z) = (p.x - L::OFFSET.0, p.z - L::OFFSET.1);
        (0.0..=n0.saturating_sub(1) as f64).contains(&x)
            && (0.0..=n1.saturating_sub(1) as f64).contains(&z)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// Value at (i, k), zero for indices outside the field.
    #[inline]
    pub fn get(&self, i: isize, k: isize) -> f64 {
        if i < 0 || k < 0 {
            return 0.0;
        }
        self.data.get((i as usize, k as usize)).copied().unwrap_or(0.0)
    }

    /// Value at an in-range node.
    #[inline]
    pub fn at(&self, i: usize, k: usize) -> f64 {
        self.data[[i, k]]
    }

    fn bilinear(&self, p: GridPosition) -> Bilinear {
        Bilinear::new(p.x - L::OFFSET.0, p.z - L::OFFSET.1, self.shape())
    }

    /// Bilinear interpolation at a position given in grid coordinates.
    pub fn sample(&self, p: GridPosition) -> f64 {
        self.bilinear(p)
            .nodes()
            .map(|((i, k), w)| w * self.data[[i, k]])
            .sum()
    }

    /// Spreads `amount` over the nodes around `p` with the same weights
    /// [`sample`](Self::sample) uses, scaled per node by `scale(i, k)`.
    pub fn spread(&mut self, p: GridPosition, amount: f64, scale: impl Fn(usize, usize) -> f64) {
        for ((i, k), w) in self.bilinear(p).nodes() {
            self.data[[i, k]] += amount * w * scale(i, k);
        }
    }

    /// Replaces every node value with `rule((i, k), old_value)`.
    ///
    /// Node updates must be independent of each other; the parallel path
    /// relies on it and produces the same bits as the serial one.
    pub fn update<F>(&mut self, execution: Execution, rule: F)
    where
        F: Fn((usize, usize), f64) -> f64 + Send + Sync,
    {
        let zip = Zip::indexed(&mut self.data);
        match execution {
            Execution::Serial => zip.for_each(|idx, v| *v = rule(idx, *v)),
            Execution::Parallel => zip.par_for_each(|idx, v| *v = rule(idx, *v)),
        }
    }

    /// Multiplies node-wise by another field of the same family.
    pub fn scale_by(&mut self, execution: Execution, factors: &StaggeredField<L>) {
        let zip = Zip::from(&mut self.data).and(&factors.data);
        match execution {
            Execution::Serial => zip.for_each(|v, &f| *v *= f),
            Execution::Parallel => zip.par_for_each(|v, &f| *v *= f),
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, &v| m.max(v.abs()))
    }

    /// First node (row-major) whose value is non-finite or exceeds `limit`.
    pub fn find_invalid(&self, limit: f64) -> Option<((usize, usize), f64)> {
        self.data
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || v.abs() > limit)
            .map(|(idx, &v)| (idx, v))
    }
}
