//! Pressure-release surface following topography.
//!
//! The surface is a staircase on the grid: every node on or above it is air.
//! Air pressure is held at zero, and so are velocities lying between two air
//! pressure nodes.

use ndarray::{s, Array2};

use crate::error::ConfigurationError;
use crate::grid::{Grid, GridPosition};
use crate::wavefield::Wavefield;

/// Depth of the surface below the top row for every grid column, in
/// fractional node units.
#[derive(Debug, Clone, PartialEq)]
pub struct Topography {
    depth: Vec<f64>,
}

impl Topography {
    pub fn new(depth: Vec<f64>) -> Self {
        Self { depth }
    }

    pub fn flat(nx: usize, depth: f64) -> Self {
        Self::new(vec![depth; nx])
    }

    /// Per-column depths given in metres, one per grid column.
    pub fn from_depths(grid: &Grid, depths_m: impl IntoIterator<Item = f64>) -> Self {
        Self::new(depths_m.into_iter().map(|z| z / grid.dz).collect())
    }

    /// Surface through `(x, depth)` control points in metres, linear between
    /// points and constant beyond the first and last one.
    pub fn from_points(grid: &Grid, points: &[(f64, f64)]) -> Result<Self, ConfigurationError> {
        if points.is_empty() {
            return Err(ConfigurationError::Empty("topography point"));
        }
        if let Some((x, z)) = points
            .iter()
            .find(|(x, z)| !x.is_finite() || !z.is_finite())
        {
            return Err(ConfigurationError::InvalidTopography(format!(
                "control point ({x}, {z}) is not finite"
            )));
        }
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let depths = (0..grid.nx).map(|i| piecewise_linear(&sorted, grid.x_coord(i)));
        Ok(Self::from_depths(grid, depths))
    }

    pub fn depths(&self) -> &[f64] {
        &self.depth
    }

    /// One finite depth per column, at least one live row below the surface.
    pub fn validate(&self, shape: (usize, usize)) -> Result<(), ConfigurationError> {
        let (nx, nz) = shape;
        if self.depth.len() != nx {
            return Err(ConfigurationError::InvalidTopography(format!(
                "{} depths given for {nx} columns",
                self.depth.len()
            )));
        }
        let deepest = nz.saturating_sub(2) as f64;
        if let Some((i, d)) = self
            .depth
            .iter()
            .enumerate()
            .find(|(_, d)| !(0.0..=deepest).contains(*d))
        {
            return Err(ConfigurationError::InvalidTopography(format!(
                "column {i} has depth {d}, must be within [0, {deepest}] nodes"
            )));
        }
        Ok(())
    }

    /// Surface depth at a fractional column, linear between columns.
    pub fn depth_at(&self, x: f64) -> f64 {
        let Some(last) = self.depth.len().checked_sub(1) else {
            return 0.0;
        };
        let x = x.clamp(0.0, last as f64);
        let i = (x.floor() as usize).min(last);
        let frac = x - i as f64;
        match self.depth.get(i + 1) {
            Some(next) => self.depth[i] * (1.0 - frac) + next * frac,
            None => self.depth[i],
        }
    }

    /// True if `p` lies strictly above the surface.
    pub fn is_above(&self, p: GridPosition) -> bool {
        p.z < self.depth_at(p.x)
    }
}

// Constant outside the first and last points; `points` is sorted by x and
// not empty.
fn piecewise_linear(points: &[(f64, f64)], x: f64) -> f64 {
    match points.iter().position(|p| p.0 > x) {
        Some(0) => points[0].1,
        Some(j) => {
            let (x0, z0) = points[j - 1];
            let (x1, z1) = points[j];
            z0 + (z1 - z0) * (x - x0) / (x1 - x0)
        }
        None => points.last().map_or(0.0, |p| p.1),
    }
}

/// Number of air rows per column for each node family.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMask {
    pressure: Vec<usize>,
    vx: Vec<usize>,
    vz: Vec<usize>,
}

impl SurfaceMask {
    pub fn new(grid: &Grid, topography: &Topography) -> Self {
        // rows k <= depth, the node on the surface included
        let pressure: Vec<usize> = (0..grid.nx)
            .map(|i| {
                let depth = topography.depths().get(i).copied().unwrap_or(0.0);
                (depth.max(0.0).floor() as usize + 1).min(grid.nz)
            })
            .collect();
        let vx = pressure.windows(2).map(|w| w[0].min(w[1])).collect();
        let vz = pressure.iter().map(|n| n.saturating_sub(1)).collect();
        Self { pressure, vx, vz }
    }

    /// Air rows of each pressure column.
    pub fn pressure_rows(&self) -> &[usize] {
        &self.pressure
    }

    pub fn is_air(&self, i: usize, k: usize) -> bool {
        self.pressure.get(i).is_some_and(|&n| k < n)
    }

    pub fn clear_velocity(&self, wavefield: &mut Wavefield) {
        clear(wavefield.vx.data_mut(), &self.vx);
        clear(wavefield.vz.data_mut(), &self.vz);
    }

    pub fn clear_pressure(&self, wavefield: &mut Wavefield) {
        clear(wavefield.pressure.data_mut(), &self.pressure);
    }
}

fn clear(data: &mut Array2<f64>, rows: &[usize]) {
    for (mut column, &n) in data.outer_iter_mut().zip(rows) {
        let n = n.min(column.len());
        column.slice_mut(s![..n]).fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(9, 12, 10.0, 5.0).unwrap()
    }

    #[test]
    fn control_points_are_interpolated_in_metres() {
        let g = grid();
        // x = 20 m .. 60 m dips from 10 m to 30 m
        let topo = Topography::from_points(&g, &[(60.0, 30.0), (20.0, 10.0)]).unwrap();
        let d = topo.depths();
        assert_eq!(d.len(), 9);
        assert_eq!(d[0], 2.0);
        assert_eq!(d[2], 2.0);
        assert_eq!(d[4], 4.0);
        assert_eq!(d[6], 6.0);
        assert_eq!(d[8], 6.0);
        assert!(topo.validate(g.shape()).is_ok());
    }

    #[test]
    fn bad_control_points_are_rejected() {
        let g = grid();
        assert_eq!(
            Topography::from_points(&g, &[]),
            Err(ConfigurationError::Empty("topography point"))
        );
        assert!(matches!(
            Topography::from_points(&g, &[(0.0, f64::NAN)]),
            Err(ConfigurationError::InvalidTopography(_))
        ));
    }

    #[test]
    fn validate_checks_length_and_range() {
        let shape = grid().shape();
        assert!(Topography::flat(8, 1.0).validate(shape).is_err());
        assert!(Topography::flat(9, -0.5).validate(shape).is_err());
        assert!(Topography::flat(9, 10.5).validate(shape).is_err());
        assert!(Topography::flat(9, 10.0).validate(shape).is_ok());
        let mut depth = vec![1.0; 9];
        depth[3] = f64::NAN;
        let err = Topography::new(depth).validate(shape).unwrap_err();
        assert!(err.to_string().contains("column 3"));
    }

    #[test]
    fn depth_between_columns_is_linear() {
        let topo = Topography::new(vec![0.0, 2.0, 4.0]);
        assert_eq!(topo.depth_at(0.5), 1.0);
        assert_eq!(topo.depth_at(1.75), 3.5);
        assert_eq!(topo.depth_at(-3.0), 0.0);
        assert_eq!(topo.depth_at(7.0), 4.0);
        assert!(topo.is_above(GridPosition::new(1.0, 1.9)));
        assert!(!topo.is_above(GridPosition::new(1.0, 2.0)));
    }

    #[test]
    fn mask_counts_air_rows_per_family() {
        let g = Grid::new(4, 8, 5.0, 5.0).unwrap();
        let topo = Topography::new(vec![0.0, 2.5, 3.0, 1.2]);
        let mask = SurfaceMask::new(&g, &topo);
        assert_eq!(mask.pressure_rows(), &[1, 3, 4, 2]);
        assert_eq!(mask.vx, vec![1, 3, 2]);
        assert_eq!(mask.vz, vec![0, 2, 3, 1]);
        assert!(mask.is_air(2, 3));
        assert!(!mask.is_air(2, 4));
        assert!(!mask.is_air(7, 0));
    }

    #[test]
    fn clearing_touches_only_air() {
        let g = Grid::new(4, 8, 5.0, 5.0).unwrap();
        let mask = SurfaceMask::new(&g, &Topography::new(vec![0.0, 2.5, 3.0, 1.2]));
        let mut wf = Wavefield::new(&g);
        wf.pressure.fill(1.0);
        wf.vx.fill(1.0);
        wf.vz.fill(1.0);

        mask.clear_pressure(&mut wf);
        for ((i, k), &p) in wf.pressure.data().indexed_iter() {
            assert_eq!(p == 0.0, mask.is_air(i, k), "pressure ({i}, {k})");
        }
        assert_eq!(wf.vx.max_abs(), 1.0);

        mask.clear_velocity(&mut wf);
        // vz (1, 1) sits between air rows 1 and 2, vz (1, 2) touches live row 3
        assert_eq!(wf.vz.at(1, 1), 0.0);
        assert_eq!(wf.vz.at(1, 2), 1.0);
        // vx (1, 2) has air on both sides, vx (1, 3) has a live node at (1, 3)
        assert_eq!(wf.vx.at(1, 2), 0.0);
        assert_eq!(wf.vx.at(1, 3), 1.0);
        assert_eq!(wf.vx.at(2, 2), 1.0);
    }
}
