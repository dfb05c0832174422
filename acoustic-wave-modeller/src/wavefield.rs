use ndarray::Zip;

use crate::grid::Grid;
use crate::model::Model;
use crate::staggered::{Centered, StaggeredField, XFace, ZFace};

/// Pressure and particle velocity on the staggered grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Wavefield {
    pub pressure: StaggeredField<Centered>,
    pub vx: StaggeredField<XFace>,
    pub vz: StaggeredField<ZFace>,
}

impl Wavefield {
    pub fn new(grid: &Grid) -> Self {
        Wavefield {
            pressure: StaggeredField::zeros(grid),
            vx: StaggeredField::zeros(grid),
            vz: StaggeredField::zeros(grid),
        }
    }

    pub fn zero(&mut self) {
        self.pressure.fill(0.0);
        self.vx.fill(0.0);
        self.vz.fill(0.0);
    }

    /// Discrete acoustic energy
    /// `1/2 * sum(P^2 / K + |v|^2 / b) * dx * dz`.
    ///
    /// Velocities sit half a step behind pressure, so this is only
    /// approximately conserved, but it is a good health indicator.
    pub fn energy(&self, model: &Model, grid: &Grid) -> f64 {
        let potential = Zip::from(self.pressure.data())
            .and(model.bulk_modulus().data())
            .fold(0.0, |acc, &p, &k| acc + p * p / k);
        let kinetic_x = Zip::from(self.vx.data())
            .and(model.buoyancy_x().data())
            .fold(0.0, |acc, &v, &b| acc + v * v / b);
        let kinetic_z = Zip::from(self.vz.data())
            .and(model.buoyancy_z().data())
            .fold(0.0, |acc, &v, &b| acc + v * v / b);
        0.5 * (potential + kinetic_x + kinetic_z) * grid.dx * grid.dz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_rest_and_resets() {
        let grid = Grid::new(8, 6, 5.0, 5.0).unwrap();
        let model = Model::homogeneous(&grid, 2000.0, 1000.0).unwrap();
        let mut wf = Wavefield::new(&grid);
        assert_eq!(wf.energy(&model, &grid), 0.0);

        wf.pressure.data_mut()[[3, 3]] = 2.0;
        wf.vx.data_mut()[[1, 2]] = 0.5;
        let e = wf.energy(&model, &grid);
        let expected = 0.5 * (4.0 / 4.0e9 + 0.25 * 1000.0) * 25.0;
        assert!((e - expected).abs() < 1e-12);

        wf.zero();
        assert_eq!(wf, Wavefield::new(&grid));
    }
}
