//! Configuration-time CFL check and the per-step divergence guard.

use crate::error::{ConfigurationError, DivergenceError};
use crate::grid::{Grid, TimeAxis};
use crate::model::Model;
use crate::staggered::{StaggeredField, Staggering};
use crate::stencil::SpaceOrder;
use crate::wavefield::Wavefield;

/// Largest stable time step: `C * min(dx, dz) / max(V)`.
pub fn max_stable_dt(grid: &Grid, max_velocity: f64, order: SpaceOrder) -> f64 {
    order.cfl_constant() * grid.min_spacing() / max_velocity
}

/// Fails with `CflViolation` if `time.dt` exceeds the stable limit.
/// Returns the limit otherwise.
pub fn check_cfl(
    grid: &Grid,
    model: &Model,
    time: &TimeAxis,
    order: SpaceOrder,
) -> Result<f64, ConfigurationError> {
    let max_dt = max_stable_dt(grid, model.max_velocity(), order);
    if time.dt > max_dt {
        return Err(ConfigurationError::CflViolation {
            dt: time.dt,
            max_dt,
        });
    }
    Ok(max_dt)
}

/// Upper bound on |field| before a run is declared diverged.
pub const DEFAULT_MAX_AMPLITUDE: f64 = 1e30;

/// Per-step check for non-finite or runaway field values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceGuard {
    max_amplitude: f64,
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self {
            max_amplitude: DEFAULT_MAX_AMPLITUDE,
        }
    }
}

impl DivergenceGuard {
    pub fn new(max_amplitude: f64) -> Result<Self, ConfigurationError> {
        if max_amplitude.is_nan() || max_amplitude <= 0.0 {
            return Err(ConfigurationError::InvalidGuard(max_amplitude));
        }
        Ok(Self { max_amplitude })
    }

    pub fn max_amplitude(&self) -> f64 {
        self.max_amplitude
    }

    /// Checks pressure, then `Vx`, then `Vz`, reporting the first offending
    /// node against `step`.
    pub fn check(&self, wavefield: &Wavefield, step: usize) -> Result<(), DivergenceError> {
        self.check_field(&wavefield.pressure, step)?;
        self.check_field(&wavefield.vx, step)?;
        self.check_field(&wavefield.vz, step)
    }

    fn check_field<L: Staggering>(
        &self,
        field: &StaggeredField<L>,
        step: usize,
    ) -> Result<(), DivergenceError> {
        match field.find_invalid(self.max_amplitude) {
            None => Ok(()),
            Some(((i, k), value)) => Err(DivergenceError {
                step,
                field: L::ROLE,
                i,
                k,
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfl_bound_matches_closed_form() {
        let grid = Grid::new(100, 100, 10.0, 5.0).unwrap();
        let dt = max_stable_dt(&grid, 2500.0, SpaceOrder::Second);
        assert!((dt - 5.0 / (2500.0 * 2f64.sqrt())).abs() < 1e-15);
        let dt4 = max_stable_dt(&grid, 2500.0, SpaceOrder::Fourth);
        assert!(dt4 < dt);
    }

    #[test]
    fn check_cfl_accepts_limit_and_rejects_above() {
        let grid = Grid::new(20, 20, 10.0, 10.0).unwrap();
        let model = Model::homogeneous(&grid, 3000.0, 2000.0).unwrap();
        let limit = max_stable_dt(&grid, 3000.0, SpaceOrder::Second);

        let ok = TimeAxis::new(limit, 10).unwrap();
        assert_eq!(check_cfl(&grid, &model, &ok, SpaceOrder::Second), Ok(limit));

        let bad = TimeAxis::new(limit * 1.01, 10).unwrap();
        assert!(matches!(
            check_cfl(&grid, &model, &bad, SpaceOrder::Second),
            Err(ConfigurationError::CflViolation { .. })
        ));
    }

    #[test]
    fn guard_reports_field_and_node() {
        let grid = Grid::new(10, 10, 1.0, 1.0).unwrap();
        let guard = DivergenceGuard::new(1e6).unwrap();
        let mut wf = Wavefield::new(&grid);
        assert!(guard.check(&wf, 0).is_ok());

        wf.vz.data_mut()[[4, 2]] = -2e6;
        let err = guard.check(&wf, 17).unwrap_err();
        assert_eq!(
            err,
            DivergenceError {
                step: 17,
                field: "vz",
                i: 4,
                k: 2,
                value: -2e6
            }
        );

        wf.pressure.data_mut()[[1, 1]] = f64::NAN;
        let err = guard.check(&wf, 18).unwrap_err();
        assert_eq!(err.field, "pressure");
        assert!(err.value.is_nan());
    }

    #[test]
    fn guard_rejects_non_positive_limit() {
        assert!(DivergenceGuard::new(0.0).is_err());
        assert!(DivergenceGuard::new(f64::NAN).is_err());
        assert!(DivergenceGuard::new(f64::INFINITY).is_ok());
    }
}
