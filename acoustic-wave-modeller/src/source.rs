use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::grid::{Grid, GridPosition};
use crate::model::Model;
use crate::staggered::{StaggeredField, XFace, ZFace};
use crate::wavefield::Wavefield;

/// Source time function.
#[derive(Clone, Debug, PartialEq)]
pub enum Wavelet {
    /// Mexican-hat wavelet peaking at `delay`.
    Ricker { peak_frequency: f64, delay: f64 },
    /// First derivative of a Gaussian, normalised to unit peak.
    GaussianDerivative { peak_frequency: f64, delay: f64 },
    /// Recorded trace, linearly interpolated and zero outside its support.
    Sampled { samples: Vec<f64>, dt: f64 },
}

impl Wavelet {
    /// Ricker wavelet with the usual delay of 1.2 periods, so it starts near zero.
    pub fn ricker(peak_frequency: f64) -> Self {
        Wavelet::Ricker {
            peak_frequency,
            delay: 1.2 / peak_frequency,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            Wavelet::Ricker {
                peak_frequency,
                delay,
            }
            | Wavelet::GaussianDerivative {
                peak_frequency,
                delay,
            } => {
                if !peak_frequency.is_finite() || *peak_frequency <= 0.0 {
                    return Err(ConfigurationError::InvalidWavelet(format!(
                        "peak frequency must be positive, got {peak_frequency}"
                    )));
                }
                if !delay.is_finite() || *delay < 0.0 {
                    return Err(ConfigurationError::InvalidWavelet(format!(
                        "delay must be non-negative, got {delay}"
                    )));
                }
            }
            Wavelet::Sampled { samples, dt } => {
                if samples.is_empty() || !dt.is_finite() || *dt <= 0.0 {
                    return Err(ConfigurationError::InvalidWavelet(format!(
                        "sampled wavelet needs samples and a positive dt (got {} samples, dt={dt})",
                        samples.len()
                    )));
                }
                if samples.iter().any(|s| !s.is_finite()) {
                    return Err(ConfigurationError::InvalidWavelet(
                        "sampled wavelet contains non-finite values".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Amplitude at time `t` (seconds).
    pub fn amplitude(&self, t: f64) -> f64 {
        match *self {
            Wavelet::Ricker {
                peak_frequency,
                delay,
            } => {
                let arg = (PI * peak_frequency * (t - delay)).powi(2);
                (1.0 - 2.0 * arg) * (-arg).exp()
            }
            Wavelet::GaussianDerivative {
                peak_frequency,
                delay,
            } => {
                let tau = PI * peak_frequency * (t - delay);
                -(2.0 * std::f64::consts::E).sqrt() * tau * (-tau * tau).exp()
            }
            Wavelet::Sampled {
                ref samples,
                dt,
            } => {
                let x = t / dt;
                if x < 0.0 || x > (samples.len() - 1) as f64 {
                    return 0.0;
                }
                let i = x.floor() as usize;
                let frac = x - i as f64;
                match samples.get(i + 1) {
                    Some(next) => samples[i] * (1.0 - frac) + next * frac,
                    None => samples[i],
                }
            }
        }
    }
}

/// Which field a source forces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Volume injection: adds to pressure (explosive source).
    #[default]
    Pressure,
    /// Horizontal body force: adds to `Vx`.
    VelocityX,
    /// Vertical body force: adds to `Vz`.
    VelocityZ,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    pub position: GridPosition,
    pub wavelet: Wavelet,
    pub amplitude: f64,
    pub kind: SourceKind,
}

impl Source {
    pub fn new(position: GridPosition, wavelet: Wavelet) -> Self {
        Self {
            position,
            wavelet,
            amplitude: 1.0,
            kind: SourceKind::Pressure,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Velocity sources must also sit within their own node span: half a
    /// cell outside it, a bilinear corner would miss the field.
    pub fn validate(&self, grid: &Grid) -> Result<(), ConfigurationError> {
        self.position.check_inside(grid, "source")?;
        let covered = match self.kind {
            SourceKind::Pressure => true,
            SourceKind::VelocityX => StaggeredField::<XFace>::covers(grid, self.position),
            SourceKind::VelocityZ => StaggeredField::<ZFace>::covers(grid, self.position),
        };
        if !covered {
            return Err(ConfigurationError::OutsideNodeSpan {
                what: "velocity source",
                x: self.position.x,
                z: self.position.z,
            });
        }
        self.wavelet.validate()?;
        if !self.amplitude.is_finite() {
            return Err(ConfigurationError::InvalidWavelet(format!(
                "source amplitude must be finite, got {}",
                self.amplitude
            )));
        }
        Ok(())
    }

    /// Time at which the wavelet is evaluated during step `step`.
    ///
    /// Pressure is advanced from t_n to t_(n+1), so its forcing is centred
    /// at t_(n+1/2); velocities are advanced across t_(n+1).
    pub fn injection_time(&self, step: usize, dt: f64) -> f64 {
        match self.kind {
            SourceKind::Pressure => (step as f64 + 0.5) * dt,
            SourceKind::VelocityX | SourceKind::VelocityZ => (step as f64 + 1.0) * dt,
        }
    }

    /// Adds this step's forcing to the wavefield. The increment is spread
    /// with bilinear weights that sum to one, so the injected total does not
    /// depend on where the source sits inside a cell.
    pub fn inject(&self, wavefield: &mut Wavefield, model: &Model, grid: &Grid, step: usize, dt: f64) {
        let w = self.wavelet.amplitude(self.injection_time(step, dt));
        let amount = dt * self.amplitude * w / (grid.dx * grid.dz);
        if amount == 0.0 {
            return;
        }
        match self.kind {
            SourceKind::Pressure => {
                let bulk = model.bulk_modulus();
                wavefield
                    .pressure
                    .spread(self.position, amount, |i, k| bulk.at(i, k));
            }
            SourceKind::VelocityX => {
                let b = model.buoyancy_x();
                wavefield.vx.spread(self.position, amount, |i, k| b.at(i, k));
            }
            SourceKind::VelocityZ => {
                let b = model.buoyancy_z();
                wavefield.vz.spread(self.position, amount, |i, k| b.at(i, k));
            }
        }
    }
}
