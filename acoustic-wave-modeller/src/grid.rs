use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Regular 2-D grid of pressure nodes. Node (i, k) sits at (i·dx, k·dz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nx: usize, // Number of nodes in x direction
    pub nz: usize, // Number of nodes in z direction (depth)
    pub dx: f64,   // Grid spacing in x (meters)
    pub dz: f64,   // Grid spacing in z (meters)
}

impl Grid {
    pub fn new(nx: usize, nz: usize, dx: f64, dz: f64) -> Result<Self, ConfigurationError> {
        for (axis, size) in [nx, nz].into_iter().enumerate() {
            if size < 2 {
                return Err(ConfigurationError::InvalidGridShape { axis, size });
            }
        }
        for h in [dx, dz] {
            if !h.is_finite() || h <= 0.0 {
                return Err(ConfigurationError::InvalidGridSpacing(h));
            }
        }
        Ok(Grid { nx, nz, dx, dz })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.nz)
    }

    pub fn x_coord(&self, i: usize) -> f64 {
        self.dx * (i as f64)
    }

    pub fn z_coord(&self, k: usize) -> f64 {
        self.dz * (k as f64)
    }

    /// True when a fractional position lies on or inside the outermost nodes.
    pub fn contains(&self, p: GridPosition) -> bool {
        p.x.is_finite()
            && p.z.is_finite()
            && (0.0..=(self.nx - 1) as f64).contains(&p.x)
            && (0.0..=(self.nz - 1) as f64).contains(&p.z)
    }

    /// Total width of domain in x direction
    pub fn width(&self) -> f64 {
        (self.nx - 1) as f64 * self.dx
    }

    /// Total depth of domain in z direction
    pub fn height(&self) -> f64 {
        (self.nz - 1) as f64 * self.dz
    }

    pub fn min_spacing(&self) -> f64 {
        self.dx.min(self.dz)
    }

    /// Converts physical coordinates (meters) to fractional node coordinates.
    pub fn position_at(&self, x: f64, z: f64) -> GridPosition {
        GridPosition::new(x / self.dx, z / self.dz)
    }
}

/// Location in fractional node units: x = 2.5 is halfway between nodes 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: f64,
    pub z: f64,
}

impl GridPosition {
    pub const fn new(x: f64, z: f64) -> Self {
        GridPosition { x, z }
    }

    pub(crate) fn check_inside(
        self,
        grid: &Grid,
        what: &'static str,
    ) -> Result<(), ConfigurationError> {
        if grid.contains(self) {
            Ok(())
        } else {
            Err(ConfigurationError::OutOfDomain {
                what,
                x: self.x,
                z: self.z,
                max_x: (grid.nx - 1) as f64,
                max_z: (grid.nz - 1) as f64,
            })
        }
    }
}

/// Discrete time axis: `nt` steps of length `dt` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    pub dt: f64,
    pub nt: usize,
}

impl TimeAxis {
    pub fn new(dt: f64, nt: usize) -> Result<Self, ConfigurationError> {
        if !dt.is_finite() || dt <= 0.0 || nt == 0 {
            return Err(ConfigurationError::InvalidTimeAxis { dt, nt });
        }
        Ok(TimeAxis { dt, nt })
    }

    /// Number of steps needed to cover `total_time`, rounded to the nearest step.
    pub fn covering(dt: f64, total_time: f64) -> Result<Self, ConfigurationError> {
        let nt = (total_time / dt).round();
        if !nt.is_finite() || nt < 1.0 {
            return Err(ConfigurationError::InvalidTimeAxis { dt, nt: 0 });
        }
        Self::new(dt, nt as usize)
    }

    pub fn total_time(&self) -> f64 {
        self.nt as f64 * self.dt
    }
}
