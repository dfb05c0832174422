use std::path::PathBuf;

use thiserror::Error;

/// Invalid grid, model, source, receiver or boundary setup.
///
/// Always raised before the first time step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid grid shape: axis {axis} has {size} nodes (must be >= 2)")]
    InvalidGridShape { axis: usize, size: usize },

    #[error("invalid grid spacing: {0} (must be positive and finite)")]
    InvalidGridSpacing(f64),

    #[error("invalid time axis: dt={dt}, nt={nt} (dt must be positive and finite, nt >= 1)")]
    InvalidTimeAxis { dt: f64, nt: usize },

    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("invalid velocity at node ({i}, {k}): {value} (must be positive and finite)")]
    InvalidVelocity { i: usize, k: usize, value: f64 },

    #[error("invalid density at node ({i}, {k}): {value} (must be positive and finite)")]
    InvalidDensity { i: usize, k: usize, value: f64 },

    #[error("CFL condition violated: dt={dt} exceeds max stable dt={max_dt}")]
    CflViolation { dt: f64, max_dt: f64 },

    #[error("{what} at ({x}, {z}) is outside the grid [0, {max_x}] x [0, {max_z}]")]
    OutOfDomain {
        what: &'static str,
        x: f64,
        z: f64,
        max_x: f64,
        max_z: f64,
    },

    #[error("{what} at ({x}, {z}) is outside the span of its staggered nodes")]
    OutsideNodeSpan { what: &'static str, x: f64, z: f64 },

    #[error("invalid topography: {0}")]
    InvalidTopography(String),

    #[error("boundary layer of {width} cells is too wide for a {nx}x{nz} grid")]
    BoundaryTooWide { width: usize, nx: usize, nz: usize },

    #[error("invalid damping factor {0} (must be in (0, 1])")]
    InvalidDamping(f64),

    #[error("invalid wavelet: {0}")]
    InvalidWavelet(String),

    #[error("invalid amplitude guard {0} (must be positive)")]
    InvalidGuard(f64),

    #[error("at least one {0} must be defined")]
    Empty(&'static str),
}

/// The wavefield blew up during time marching.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("wavefield diverged at step {step}: {field} = {value} at node ({i}, {k})")]
pub struct DivergenceError {
    /// Index of the step that produced the offending value.
    pub step: usize,
    /// Field role that failed the check.
    pub field: &'static str,
    pub i: usize,
    pub k: usize,
    pub value: f64,
}

/// Anything that can stop a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Divergence(#[from] DivergenceError),

    #[error("run cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("simulation already finished after {nt} steps")]
    Finished { nt: usize },
}

/// Failures reading or writing `.npy` arrays.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("array in {path} has shape {got:?}, expected {expected:?}")]
    Shape {
        path: PathBuf,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cfl_violation() {
        let e = ConfigurationError::CflViolation {
            dt: 0.002,
            max_dt: 0.001,
        };
        assert_eq!(
            e.to_string(),
            "CFL condition violated: dt=0.002 exceeds max stable dt=0.001"
        );
    }

    #[test]
    fn display_divergence_reports_step() {
        let e = DivergenceError {
            step: 42,
            field: "pressure",
            i: 3,
            k: 7,
            value: f64::NAN,
        };
        assert_eq!(
            e.to_string(),
            "wavefield diverged at step 42: pressure = NaN at node (3, 7)"
        );
    }

    #[test]
    fn simulation_error_is_transparent() {
        let e: SimulationError = ConfigurationError::InvalidDamping(1.5).into();
        assert_eq!(e.to_string(), "invalid damping factor 1.5 (must be in (0, 1])");
        assert!(matches!(e, SimulationError::Configuration(_)));
    }

    #[test]
    fn display_boundary_too_wide() {
        let e = ConfigurationError::BoundaryTooWide {
            width: 50,
            nx: 100,
            nz: 80,
        };
        assert!(e.to_string().contains("50 cells"));
        assert!(e.to_string().contains("100x80"));
    }
}
