use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::boundary::BoundaryConfig;
use crate::grid::{Grid, TimeAxis};
use crate::io;
use crate::model::{Layer, Model, DEFAULT_DENSITY};
use crate::receiver::ReceiverArray;
use crate::simulation::SimulationParams;
use crate::source::{Source, SourceKind, Wavelet};
use crate::stability::{self, DivergenceGuard, DEFAULT_MAX_AMPLITUDE};
use crate::staggered::Execution;
use crate::stencil::SpaceOrder;
use crate::surface::Topography;
use crate::survey::{Shot, Survey};

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub nx: usize,
    pub nz: usize,
    pub dx: f64,
    pub dz: f64,
}

/// Velocity/density model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    Homogeneous {
        velocity: f64,
        #[serde(default = "default_density")]
        density: f64,
    },
    Layered {
        layers: Vec<Layer>,
    },
    Gradient {
        v0: f64,
        gradient: f64,
        #[serde(default = "default_density")]
        density: f64,
    },
    /// `.npy` arrays of shape (nx, nz), relative to the config file.
    File {
        velocity: PathBuf,
        #[serde(default)]
        density: Option<PathBuf>,
    },
}

fn default_density() -> f64 {
    DEFAULT_DENSITY
}

/// Free surface following topography, depths in metres below z = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopographyConfig {
    /// `[x, depth]` control points, linear in between.
    Points { points: Vec<[f64; 2]> },
    /// 1-D `.npy` array with one depth per grid column.
    File { depth: PathBuf },
}

/// Time stepping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>, // Optional: computed from the CFL limit if not provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nt: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    #[serde(default = "default_courant")]
    pub courant: f64,
    #[serde(default)]
    pub order: SpaceOrder,
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: f64,
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_interval: Option<usize>,
}

fn default_courant() -> f64 {
    0.5
}

fn default_max_amplitude() -> f64 {
    DEFAULT_MAX_AMPLITUDE
}

fn default_report_interval() -> usize {
    100
}

impl TimeConfig {
    fn validate(&self) -> Result<()> {
        match (self.nt, self.total_time) {
            (None, None) => bail!("time: one of nt or total_time must be given"),
            (Some(_), Some(_)) => bail!("time: give either nt or total_time, not both"),
            (_, Some(t)) if !(t > 0.0) => bail!("total_time must be positive, got {t}"),
            _ => {}
        }
        if !(self.courant > 0.0 && self.courant <= 1.0) {
            bail!("courant must be in (0, 1], got {}", self.courant);
        }
        Ok(())
    }

    /// Time axis for `max_stable_dt`, deriving dt from the Courant factor
    /// when it is not given.
    fn time_axis(&self, max_stable_dt: f64) -> Result<TimeAxis> {
        let dt = self.dt.unwrap_or(self.courant * max_stable_dt);
        let axis = match (self.nt, self.total_time) {
            (Some(nt), _) => TimeAxis::new(dt, nt)?,
            (None, Some(t)) => TimeAxis::covering(dt, t)?,
            (None, None) => bail!("time: one of nt or total_time must be given"),
        };
        Ok(axis)
    }
}

/// Receiver layout, in metres.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiverConfig {
    Line {
        start: [f64; 2],
        end: [f64; 2],
        count: usize,
    },
    Points {
        positions: Vec<[f64; 2]>,
    },
}

impl ReceiverConfig {
    fn build(&self, grid: &Grid) -> ReceiverArray {
        let at = |[x, z]: [f64; 2]| grid.position_at(x, z);
        match self {
            ReceiverConfig::Line { start, end, count } => {
                ReceiverArray::line(at(*start), at(*end), *count)
            }
            ReceiverConfig::Points { positions } => {
                ReceiverArray::new(positions.iter().copied().map(at).collect())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveletConfig {
    Ricker {
        frequency: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<f64>,
    },
    GaussianDerivative {
        frequency: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<f64>,
    },
    Sampled {
        samples: Vec<f64>,
        dt: f64,
    },
}

impl WaveletConfig {
    fn build(&self) -> Wavelet {
        match self {
            WaveletConfig::Ricker { frequency, delay } => Wavelet::Ricker {
                peak_frequency: *frequency,
                delay: delay.unwrap_or(1.2 / frequency),
            },
            WaveletConfig::GaussianDerivative { frequency, delay } => {
                Wavelet::GaussianDerivative {
                    peak_frequency: *frequency,
                    delay: delay.unwrap_or(1.2 / frequency),
                }
            }
            WaveletConfig::Sampled { samples, dt } => Wavelet::Sampled {
                samples: samples.clone(),
                dt: *dt,
            },
        }
    }
}

/// Source configuration, position in metres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub x: f64,
    pub z: f64,
    pub wavelet: WaveletConfig,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default)]
    pub kind: SourceKind,
}

fn default_amplitude() -> f64 {
    1.0
}

impl SourceConfig {
    fn build(&self, grid: &Grid) -> Source {
        Source::new(grid.position_at(self.x, self.z), self.wavelet.build())
            .with_amplitude(self.amplitude)
            .with_kind(self.kind)
    }
}

/// Sources fired together, optionally with their own receivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivers: Option<ReceiverConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: Execution,
    /// Rayon worker threads; all cores when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub model: ModelConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topography: Option<TopographyConfig>,
    pub time: TimeConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivers: Option<ReceiverConfig>,
    pub shots: Vec<ShotConfig>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Directory relative model paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Everything needed to run a survey.
#[derive(Debug, Clone)]
pub struct RunSetup {
    pub grid: Grid,
    pub model: Arc<Model>,
    pub params: SimulationParams,
    pub survey: Survey,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("failed to parse TOML config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks the engine cannot make itself. Physical checks
    /// (CFL, positions, positivity) happen in [`build`](Self::build).
    pub fn validate(&self) -> Result<()> {
        self.time.validate()?;
        if self.shots.is_empty() {
            bail!("at least one [[shots]] entry must be defined");
        }
        for (idx, shot) in self.shots.iter().enumerate() {
            if shot.sources.is_empty() {
                bail!("shot {idx} has no sources");
            }
            if shot.receivers.is_none() && self.receivers.is_none() {
                bail!("shot {idx} has no receivers and no global [receivers] are set");
            }
        }
        if self.execution.threads == Some(0) {
            bail!("execution.threads must be at least 1");
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn build_model(&self, grid: &Grid) -> Result<Model> {
        let model = match &self.model {
            ModelConfig::Homogeneous { velocity, density } => {
                Model::homogeneous(grid, *velocity, *density)?
            }
            ModelConfig::Layered { layers } => Model::layered(grid, layers)?,
            ModelConfig::Gradient {
                v0,
                gradient,
                density,
            } => Model::linear_gradient(grid, *v0, *gradient, *density)?,
            ModelConfig::File { velocity, density } => {
                let velocity = io::load_model_array(&self.resolve(velocity), grid.shape())
                    .context("loading velocity model")?;
                let density = density
                    .as_ref()
                    .map(|p| io::load_model_array(&self.resolve(p), grid.shape()))
                    .transpose()
                    .context("loading density model")?;
                Model::new(grid, velocity, density)?
            }
        };
        let Some(topography) = &self.topography else {
            return Ok(model);
        };
        let topography = match topography {
            TopographyConfig::Points { points } => {
                let points: Vec<(f64, f64)> = points.iter().map(|&[x, z]| (x, z)).collect();
                Topography::from_points(grid, &points)?
            }
            TopographyConfig::File { depth } => {
                let depth = io::load_surface(&self.resolve(depth), grid.nx)
                    .context("loading topography")?;
                Topography::from_depths(grid, depth.iter().copied())
            }
        };
        model
            .with_topography(topography)
            .context("invalid [topography]")
    }

    /// Builds the grid, model, parameters and shots, running every
    /// configuration-time check.
    pub fn build(&self) -> Result<RunSetup> {
        let g = &self.grid;
        let grid = Grid::new(g.nx, g.nz, g.dx, g.dz).context("invalid [grid]")?;
        let model = self.build_model(&grid).context("invalid [model]")?;

        let max_dt = stability::max_stable_dt(&grid, model.max_velocity(), self.time.order);
        let time = self.time.time_axis(max_dt).context("invalid [time]")?;
        stability::check_cfl(&grid, &model, &time, self.time.order).context("invalid [time]")?;
        self.boundary.validate(&grid).context("invalid [boundary]")?;
        if time.dt < 1e-7 {
            warn!(dt = time.dt, "time step is very small, simulation may be slow");
        }

        let mut params = SimulationParams::new(time)
            .with_order(self.time.order)
            .with_boundary(self.boundary)
            .with_guard(DivergenceGuard::new(self.time.max_amplitude)?)
            .with_execution(self.execution.mode);
        params.report_interval = self.time.report_interval;
        if let Some(interval) = self.time.snapshot_interval {
            params = params.with_snapshots(interval);
        }

        let mut survey = Survey::default();
        for shot in &self.shots {
            let receivers = shot
                .receivers
                .as_ref()
                .or(self.receivers.as_ref())
                .map(|r| r.build(&grid))
                .unwrap_or_default();
            let sources = shot.sources.iter().map(|s| s.build(&grid)).collect();
            survey.push(Shot::new(sources, receivers));
        }

        Ok(RunSetup {
            grid,
            model: Arc::new(model),
            params,
            survey,
        })
    }

    /// Log configuration summary
    pub fn log_summary(&self, setup: &RunSetup) {
        let grid = &setup.grid;
        info!(
            nx = grid.nx,
            nz = grid.nz,
            width_m = grid.width(),
            height_m = grid.height(),
            "grid"
        );
        info!(
            v_min = setup.model.min_velocity(),
            v_max = setup.model.max_velocity(),
            "model"
        );
        let time = setup.params.time;
        info!(
            dt = time.dt,
            nt = time.nt,
            total_time = time.total_time(),
            order = setup.params.order.as_u8(),
            "time"
        );
        info!(
            width = self.boundary.width,
            min_factor = self.boundary.min_factor,
            free_surface = self.boundary.free_surface,
            "boundary"
        );
        if let Some(topography) = setup.model.topography() {
            let depths = topography.depths();
            info!(
                min_depth_m = depths.iter().copied().fold(f64::INFINITY, f64::min) * grid.dz,
                max_depth_m = depths.iter().copied().fold(0.0, f64::max) * grid.dz,
                "topography"
            );
        }
        for (idx, shot) in setup.survey.shots().iter().enumerate() {
            info!(
                shot = idx,
                sources = shot.sources.len(),
                receivers = shot.receivers.len(),
                "shot"
            );
        }
    }
}
