use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::grid::{Grid, GridPosition};
use crate::staggered::{Centered, Execution, StaggeredField, XFace, ZFace};
use crate::surface::{SurfaceMask, Topography};
use crate::wavefield::Wavefield;

/// Absorbing sponge settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Layer thickness in cells on each damped edge. Zero disables damping.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Per-step factor applied on the outermost nodes.
    #[serde(default = "default_min_factor")]
    pub min_factor: f64,
    /// Flat pressure-release surface on the top edge instead of a sponge.
    #[serde(default)]
    pub free_surface: bool,
}

fn default_width() -> usize {
    30
}

fn default_min_factor() -> f64 {
    0.9
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            min_factor: default_min_factor(),
            free_surface: false,
        }
    }
}

impl BoundaryConfig {
    /// Rigid, fully reflecting edges.
    pub fn reflecting() -> Self {
        Self {
            width: 0,
            min_factor: 1.0,
            free_surface: false,
        }
    }

    pub fn validate(&self, grid: &Grid) -> Result<(), ConfigurationError> {
        let too_wide = self
            .width
            .checked_mul(2)
            .map_or(true, |span| span >= grid.nx || span >= grid.nz);
        if too_wide {
            return Err(ConfigurationError::BoundaryTooWide {
                width: self.width,
                nx: grid.nx,
                nz: grid.nz,
            });
        }
        if !(self.min_factor > 0.0 && self.min_factor <= 1.0) {
            return Err(ConfigurationError::InvalidDamping(self.min_factor));
        }
        Ok(())
    }
}

/// Exponential sponge factors for every node family, computed once, plus the
/// air mask of a free surface when there is one.
#[derive(Debug, Clone)]
pub struct BoundaryProfile {
    config: BoundaryConfig,
    extent: (f64, f64),
    pressure: StaggeredField<Centered>,
    vx: StaggeredField<XFace>,
    vz: StaggeredField<ZFace>,
    surface: Option<SurfaceMask>,
}

impl BoundaryProfile {
    /// A topography replaces the flat `free_surface` and also frees the top
    /// edge from the sponge.
    pub fn new(
        grid: &Grid,
        config: BoundaryConfig,
        topography: Option<&Topography>,
    ) -> Result<Self, ConfigurationError> {
        config.validate(grid)?;
        let surface = match topography {
            Some(topography) => {
                topography.validate(grid.shape())?;
                Some(SurfaceMask::new(grid, topography))
            }
            None if config.free_surface => {
                Some(SurfaceMask::new(grid, &Topography::flat(grid.nx, 0.0)))
            }
            None => None,
        };
        let config = BoundaryConfig {
            free_surface: surface.is_some(),
            ..config
        };
        let extent = ((grid.nx - 1) as f64, (grid.nz - 1) as f64);
        let factor = |p: GridPosition| Self::factor_at(&config, extent, p);
        Ok(Self {
            config,
            extent,
            pressure: StaggeredField::from_positions(grid, factor),
            vx: StaggeredField::from_positions(grid, factor),
            vz: StaggeredField::from_positions(grid, factor),
            surface,
        })
    }

    // exp(ln(min_factor) * r^2) with r going from 0 at the inner edge of the
    // layer to 1 on the outermost node.
    fn edge_factor(config: &BoundaryConfig, distance: f64) -> f64 {
        let width = config.width as f64;
        if config.width == 0 || distance >= width {
            return 1.0;
        }
        let r = (width - distance) / width;
        (config.min_factor.ln() * r * r).exp()
    }

    fn factor_at(config: &BoundaryConfig, extent: (f64, f64), p: GridPosition) -> f64 {
        let top = if config.free_surface {
            1.0
        } else {
            Self::edge_factor(config, p.z)
        };
        Self::edge_factor(config, p.x)
            * Self::edge_factor(config, extent.0 - p.x)
            * top
            * Self::edge_factor(config, extent.1 - p.z)
    }

    /// Damping factor at an arbitrary position (1 in the interior).
    pub fn factor(&self, p: GridPosition) -> f64 {
        Self::factor_at(&self.config, self.extent, p)
    }

    /// True if `p` lies inside a damped layer.
    pub fn in_layer(&self, p: GridPosition) -> bool {
        self.factor(p) < 1.0
    }

    pub fn pressure_factors(&self) -> &StaggeredField<Centered> {
        &self.pressure
    }

    pub fn surface(&self) -> Option<&SurfaceMask> {
        self.surface.as_ref()
    }

    /// Damps both velocity components, then clears those in the air.
    pub fn apply_to_velocity(&self, wavefield: &mut Wavefield, execution: Execution) {
        if self.config.width > 0 {
            wavefield.vx.scale_by(execution, &self.vx);
            wavefield.vz.scale_by(execution, &self.vz);
        }
        if let Some(surface) = &self.surface {
            surface.clear_velocity(wavefield);
        }
    }

    /// Damps pressure, then clears it on and above the free surface. Runs
    /// after injection, so nothing a source adds survives in the air.
    pub fn apply_to_pressure(&self, wavefield: &mut Wavefield, execution: Execution) {
        if self.config.width > 0 {
            wavefield.pressure.scale_by(execution, &self.pressure);
        }
        if let Some(surface) = &self.surface {
            surface.clear_pressure(wavefield);
        }
    }
}
