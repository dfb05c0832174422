use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::grid::Grid;
use crate::staggered::{Centered, StaggeredField, XFace, ZFace};
use crate::surface::Topography;

/// Density used when a model gives velocities only (water-like, kg/m³).
pub const DEFAULT_DENSITY: f64 = 1000.0;

/// A constant-property layer starting at `top` metres depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub top: f64,
    pub velocity: f64,
    #[serde(default = "default_density")]
    pub density: f64,
}

fn default_density() -> f64 {
    DEFAULT_DENSITY
}

/// Acoustic medium on the grid nodes.
#[derive(Debug, Clone)]
pub struct Model {
    // Primary storage at (i, k) positions - pressure locations
    velocity: Array2<f64>,
    density: Array2<f64>,

    // Pre-computed coefficients at the node family each update writes to
    bulk_modulus: StaggeredField<Centered>, // rho * V^2 at pressure nodes
    buoyancy_x: StaggeredField<XFace>,      // 1/rho at vx positions (i+1/2, k)
    buoyancy_z: StaggeredField<ZFace>,      // 1/rho at vz positions (i, k+1/2)

    // Pressure-release surface; nodes above it are air
    topography: Option<Topography>,
}

impl Model {
    /// Builds a model from per-node velocity and optional density.
    ///
    /// # Errors
    /// `ShapeMismatch` if an array is not `(nx, nz)`, `InvalidVelocity` /
    /// `InvalidDensity` for the first non-positive or non-finite value.
    pub fn new(
        grid: &Grid,
        velocity: Array2<f64>,
        density: Option<Array2<f64>>,
    ) -> Result<Self, ConfigurationError> {
        let shape = grid.shape();
        let density = density.unwrap_or_else(|| Array2::from_elem(shape, DEFAULT_DENSITY));

        for (what, field) in [("velocity", &velocity), ("density", &density)] {
            if field.dim() != shape {
                return Err(ConfigurationError::ShapeMismatch {
                    what,
                    expected: shape,
                    got: field.dim(),
                });
            }
        }
        if let Some(((i, k), &value)) = velocity
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(ConfigurationError::InvalidVelocity { i, k, value });
        }
        if let Some(((i, k), &value)) = density
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(ConfigurationError::InvalidDensity { i, k, value });
        }

        let bulk = Array2::from_shape_fn(shape, |(i, k)| {
            density[[i, k]] * velocity[[i, k]] * velocity[[i, k]]
        });
        let bulk_modulus = StaggeredField::from_array(grid, bulk)?;
        let buoyancy_x = StaggeredField::from_array(grid, Self::average_to_vx(&density))?;
        let buoyancy_z = StaggeredField::from_array(grid, Self::average_to_vz(&density))?;

        Ok(Self {
            velocity,
            density,
            bulk_modulus,
            buoyancy_x,
            buoyancy_z,
            topography: None,
        })
    }

    /// Puts a free surface following `topography` on top of the medium.
    /// Properties above it stay in the arrays but are never excited.
    pub fn with_topography(mut self, topography: Topography) -> Result<Self, ConfigurationError> {
        topography.validate(self.shape())?;
        self.topography = Some(topography);
        Ok(self)
    }

    pub fn homogeneous(grid: &Grid, velocity: f64, density: f64) -> Result<Self, ConfigurationError> {
        Self::new(
            grid,
            Array2::from_elem(grid.shape(), velocity),
            Some(Array2::from_elem(grid.shape(), density)),
        )
    }

    /// Horizontally layered model. Layers are sorted by `top`; nodes above
    /// the shallowest top take the shallowest layer's properties.
    pub fn layered(grid: &Grid, layers: &[Layer]) -> Result<Self, ConfigurationError> {
        if layers.is_empty() {
            return Err(ConfigurationError::Empty("layer"));
        }
        let mut sorted = layers.to_vec();
        sorted.sort_by(|a, b| a.top.total_cmp(&b.top));
        let layer_at = |k: usize| {
            let z = grid.z_coord(k);
            sorted
                .iter()
                .rev()
                .find(|layer| layer.top <= z)
                .unwrap_or(&sorted[0])
        };
        let velocity = Array2::from_shape_fn(grid.shape(), |(_, k)| layer_at(k).velocity);
        let density = Array2::from_shape_fn(grid.shape(), |(_, k)| layer_at(k).density);
        Self::new(grid, velocity, Some(density))
    }

    /// `V(z) = v0 + gradient * z` with constant density.
    pub fn linear_gradient(
        grid: &Grid,
        v0: f64,
        gradient: f64,
        density: f64,
    ) -> Result<Self, ConfigurationError> {
        let velocity = Array2::from_shape_fn(grid.shape(), |(_, k)| v0 + gradient * grid.z_coord(k));
        Self::new(grid, velocity, Some(Array2::from_elem(grid.shape(), density)))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.velocity.dim()
    }

    pub fn velocity(&self) -> &Array2<f64> {
        &self.velocity
    }

    pub fn density(&self) -> &Array2<f64> {
        &self.density
    }

    pub fn bulk_modulus(&self) -> &StaggeredField<Centered> {
        &self.bulk_modulus
    }

    pub fn buoyancy_x(&self) -> &StaggeredField<XFace> {
        &self.buoyancy_x
    }

    pub fn buoyancy_z(&self) -> &StaggeredField<ZFace> {
        &self.buoyancy_z
    }

    pub fn topography(&self) -> Option<&Topography> {
        self.topography.as_ref()
    }

    pub fn max_velocity(&self) -> f64 {
        self.velocity.iter().copied().fold(f64::MIN, f64::max)
    }

    pub fn min_velocity(&self) -> f64 {
        self.velocity.iter().copied().fold(f64::MAX, f64::min)
    }

    fn harmonic_mean(a: f64, b: f64) -> f64 {
        2.0 * a * b / (a + b)
    }

    // Buoyancy half way between two density nodes: 1 / harmonic mean of rho.
    fn average_to_vx(rho: &Array2<f64>) -> Array2<f64> {
        let (nx, nz) = rho.dim();
        Array2::from_shape_fn((nx - 1, nz), |(i, k)| {
            1.0 / Self::harmonic_mean(rho[[i, k]], rho[[i + 1, k]])
        })
    }

    fn average_to_vz(rho: &Array2<f64>) -> Array2<f64> {
        let (nx, nz) = rho.dim();
        Array2::from_shape_fn((nx, nz - 1), |(i, k)| {
            1.0 / Self::harmonic_mean(rho[[i, k]], rho[[i, k + 1]])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(5, 8, 10.0, 10.0).unwrap()
    }

    #[test]
    fn density_defaults_to_homogeneous() {
        let g = grid();
        let model = Model::new(&g, Array2::from_elem((5, 8), 1500.0), None).unwrap();
        assert!(model.density().iter().all(|&r| r == DEFAULT_DENSITY));
        assert_eq!(model.bulk_modulus().at(2, 3), 1000.0 * 1500.0 * 1500.0);
        assert_eq!(model.buoyancy_x().at(0, 0), 1.0 / 1000.0);
    }

    #[test]
    fn rejects_non_positive_velocity() {
        let g = grid();
        let mut v = Array2::from_elem((5, 8), 1500.0);
        v[[3, 6]] = 0.0;
        let err = Model::new(&g, v, None).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidVelocity {
                i: 3,
                k: 6,
                value: 0.0
            }
        );
    }

    #[test]
    fn rejects_nan_density() {
        let g = grid();
        let mut rho = Array2::from_elem((5, 8), 1000.0);
        rho[[1, 1]] = f64::NAN;
        let err = Model::new(&g, Array2::from_elem((5, 8), 1500.0), Some(rho)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidDensity { i: 1, k: 1, .. }));
    }

    #[test]
    fn rejects_wrong_shape() {
        let g = grid();
        let err = Model::new(&g, Array2::from_elem((8, 5), 1500.0), None).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::ShapeMismatch {
                what: "velocity",
                expected: (5, 8),
                got: (8, 5)
            }
        );
    }

    #[test]
    fn buoyancy_uses_harmonic_density() {
        let g = grid();
        let model = Model::layered(
            &g,
            &[
                Layer { top: 0.0, velocity: 1500.0, density: 1000.0 },
                Layer { top: 35.0, velocity: 2500.0, density: 3000.0 },
            ],
        )
        .unwrap();
        // nodes k = 0..=3 (z <= 30) are layer one, k >= 4 layer two
        assert_eq!(model.velocity()[[0, 3]], 1500.0);
        assert_eq!(model.velocity()[[0, 4]], 2500.0);
        let b = model.buoyancy_z().at(0, 3);
        let expected = (1.0 / 1000.0 + 1.0 / 3000.0) / 2.0;
        assert!((b - expected).abs() < 1e-15);
        assert_eq!(model.max_velocity(), 2500.0);
        assert_eq!(model.min_velocity(), 1500.0);
    }

    #[test]
    fn topography_must_fit_the_grid() {
        let g = grid();
        let model = Model::homogeneous(&g, 1500.0, 1000.0).unwrap();
        assert!(model.topography().is_none());
        assert!(matches!(
            model.clone().with_topography(Topography::flat(4, 1.0)),
            Err(ConfigurationError::InvalidTopography(_))
        ));
        let model = model.with_topography(Topography::flat(5, 2.5)).unwrap();
        assert_eq!(model.topography().unwrap().depths(), &[2.5; 5]);
    }

    #[test]
    fn gradient_model_grows_with_depth() {
        let g = grid();
        let model = Model::linear_gradient(&g, 1500.0, 0.5, 1000.0).unwrap();
        assert_eq!(model.velocity()[[2, 0]], 1500.0);
        assert_eq!(model.velocity()[[2, 7]], 1535.0);
        assert!(Model::linear_gradient(&g, 10.0, -1.0, 1000.0).is_err());
    }
}
