use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::boundary::{BoundaryConfig, BoundaryProfile};
use crate::error::{ConfigurationError, DivergenceError, Result, SimulationError};
use crate::grid::{Grid, GridPosition, TimeAxis};
use crate::model::Model;
use crate::receiver::{Gather, GatherRecorder, ReceiverArray};
use crate::source::Source;
use crate::stability::{self, DivergenceGuard};
use crate::staggered::Execution;
use crate::stencil::{self, Axis, SpaceOrder};
use crate::wavefield::Wavefield;

/// Everything about a run except the model, sources and receivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub time: TimeAxis,
    pub order: SpaceOrder,
    pub boundary: BoundaryConfig,
    pub guard: DivergenceGuard,
    pub execution: Execution,
    /// Log progress every this many steps (0 disables).
    pub report_interval: usize,
    /// Keep a copy of the pressure field every this many steps.
    pub snapshot_interval: Option<usize>,
}

impl SimulationParams {
    pub fn new(time: TimeAxis) -> Self {
        Self {
            time,
            order: SpaceOrder::default(),
            boundary: BoundaryConfig::default(),
            guard: DivergenceGuard::default(),
            execution: Execution::default(),
            report_interval: 100,
            snapshot_interval: None,
        }
    }

    pub fn with_order(mut self, order: SpaceOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryConfig) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_guard(mut self, guard: DivergenceGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_snapshots(mut self, interval: usize) -> Self {
        self.snapshot_interval = (interval > 0).then_some(interval);
        self
    }

    pub fn total_time(&self) -> f64 {
        self.time.total_time()
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Initialized,
    Stepping,
    Completed,
    Diverged,
    Cancelled,
}

/// Cooperative stop flag, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pressure field captured at the end of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub step: usize,
    pub time: f64,
    pub pressure: Array2<f64>,
}

/// One shot: a time-marching loop that owns its wavefield.
pub struct Simulation {
    grid: Grid,
    model: Arc<Model>,
    params: SimulationParams,
    sources: Vec<Source>,
    receivers: ReceiverArray,
    boundary: BoundaryProfile,
    wavefield: Wavefield,
    recorder: Option<GatherRecorder>,
    snapshots: Vec<Snapshot>,
    current_timestep: usize,
    state: SimulationState,
    divergence: Option<DivergenceError>,
}

impl Simulation {
    /// Validates the whole setup. Nothing is stepped if this fails.
    pub fn new(
        grid: Grid,
        model: impl Into<Arc<Model>>,
        params: SimulationParams,
        sources: Vec<Source>,
        receivers: ReceiverArray,
    ) -> std::result::Result<Self, ConfigurationError> {
        let model = model.into();
        if model.shape() != grid.shape() {
            return Err(ConfigurationError::ShapeMismatch {
                what: "model",
                expected: grid.shape(),
                got: model.shape(),
            });
        }
        let max_dt = stability::check_cfl(&grid, &model, &params.time, params.order)?;

        if sources.is_empty() {
            return Err(ConfigurationError::Empty("source"));
        }
        for source in &sources {
            source.validate(&grid)?;
        }
        receivers.validate(&grid)?;

        let boundary = BoundaryProfile::new(&grid, params.boundary, model.topography())?;
        let above_surface = |p: GridPosition| model.topography().is_some_and(|t| t.is_above(p));
        for (idx, source) in sources.iter().enumerate() {
            if boundary.in_layer(source.position) {
                warn!(source = idx, x = source.position.x, z = source.position.z, "source inside absorbing layer");
            }
            if above_surface(source.position) {
                warn!(source = idx, x = source.position.x, z = source.position.z, "source above free surface");
            }
        }
        let damped = receivers
            .positions()
            .iter()
            .filter(|p| boundary.in_layer(**p))
            .count();
        if damped > 0 {
            warn!(receivers = damped, "receivers inside absorbing layer");
        }
        let in_air = receivers
            .positions()
            .iter()
            .filter(|p| above_surface(**p))
            .count();
        if in_air > 0 {
            warn!(receivers = in_air, "receivers above free surface record zeros");
        }

        debug!(
            nx = grid.nx,
            nz = grid.nz,
            dt = params.time.dt,
            max_dt,
            order = params.order.as_u8(),
            "simulation configured"
        );

        let wavefield = Wavefield::new(&grid);
        let recorder = GatherRecorder::new(params.time.nt, receivers.len(), params.time.dt);

        Ok(Self {
            grid,
            model,
            params,
            sources,
            receivers,
            boundary,
            wavefield,
            recorder: Some(recorder),
            snapshots: Vec::new(),
            current_timestep: 0,
            state: SimulationState::Initialized,
            divergence: None,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_timestep
    }

    /// Time reached by the fields: t = step * dt.
    pub fn current_time(&self) -> f64 {
        self.current_timestep as f64 * self.params.time.dt
    }

    pub fn is_finished(&self) -> bool {
        self.current_timestep >= self.params.time.nt
    }

    pub fn wavefield(&self) -> &Wavefield {
        &self.wavefield
    }

    /// Direct access to the fields between steps (diagnostics, fault injection).
    pub fn wavefield_mut(&mut self) -> &mut Wavefield {
        &mut self.wavefield
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn take_snapshots(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.snapshots)
    }

    /// Back to t = 0 with zeroed fields and an empty gather.
    pub fn reset(&mut self) {
        self.wavefield.zero();
        self.recorder = Some(GatherRecorder::new(
            self.params.time.nt,
            self.receivers.len(),
            self.params.time.dt,
        ));
        self.snapshots.clear();
        self.current_timestep = 0;
        self.state = SimulationState::Initialized;
        self.divergence = None;
    }

    /// Advances one time step.
    ///
    /// The velocity update must precede the pressure update: the leapfrog
    /// ordering is what makes the scheme second order in time.
    pub fn step(&mut self) -> Result<()> {
        match self.state {
            SimulationState::Diverged => {
                if let Some(err) = &self.divergence {
                    return Err(err.clone().into());
                }
                return Err(SimulationError::Finished {
                    nt: self.params.time.nt,
                });
            }
            SimulationState::Completed => {
                return Err(SimulationError::Finished {
                    nt: self.params.time.nt,
                })
            }
            SimulationState::Cancelled => {
                return Err(SimulationError::Cancelled {
                    step: self.current_timestep,
                })
            }
            SimulationState::Initialized | SimulationState::Stepping => {}
        }
        self.state = SimulationState::Stepping;
        let step = self.current_timestep;
        let execution = self.params.execution;

        // 1. Update velocities from pressure gradients
        self.update_velocities();

        // 2. Damp velocities in the sponge, clear them above the surface
        self.boundary.apply_to_velocity(&mut self.wavefield, execution);

        // 3. Update pressure from velocity divergence
        self.update_pressure();

        // 4. Inject sources
        self.apply_sources(step);

        // 5. Damp pressure in the sponge, zero it on and above the surface
        self.boundary.apply_to_pressure(&mut self.wavefield, execution);

        if let Err(err) = self.params.guard.check(&self.wavefield, step) {
            warn!(step, field = err.field, i = err.i, k = err.k, value = err.value, "wavefield diverged");
            self.state = SimulationState::Diverged;
            self.recorder = None;
            self.divergence = Some(err.clone());
            return Err(err.into());
        }

        // 6. Record receivers
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(step, &self.wavefield.pressure, &self.receivers);
        }

        self.current_timestep += 1;

        if let Some(interval) = self.params.snapshot_interval {
            if self.current_timestep % interval == 0 {
                self.snapshots.push(Snapshot {
                    step,
                    time: self.current_time(),
                    pressure: self.wavefield.pressure.data().clone(),
                });
            }
        }

        if self.is_finished() {
            self.state = SimulationState::Completed;
        }
        Ok(())
    }

    /// Runs all remaining steps and hands back the gather.
    pub fn run(&mut self) -> Result<Gather> {
        self.run_with_cancel(&CancellationToken::new())
    }

    /// Like [`run`](Self::run), but stops between steps once `cancel` fires.
    pub fn run_with_cancel(&mut self, cancel: &CancellationToken) -> Result<Gather> {
        info!(
            nx = self.grid.nx,
            nz = self.grid.nz,
            dt = self.params.time.dt,
            nt = self.params.time.nt,
            total_time = self.params.total_time(),
            sources = self.sources.len(),
            receivers = self.receivers.len(),
            "starting simulation"
        );

        let report = self.params.report_interval;
        while !self.is_finished() {
            if cancel.is_cancelled() {
                info!(step = self.current_timestep, "simulation cancelled");
                self.state = SimulationState::Cancelled;
                self.recorder = None;
                return Err(SimulationError::Cancelled {
                    step: self.current_timestep,
                });
            }
            self.step()?;

            if report > 0 && self.current_timestep % report == 0 {
                debug!(
                    step = self.current_timestep,
                    nt = self.params.time.nt,
                    t = self.current_time(),
                    max_pressure = self.wavefield.pressure.max_abs(),
                    energy = self.wavefield.energy(&self.model, &self.grid),
                    "progress"
                );
            }
        }

        let gather = self
            .recorder
            .take()
            .map(GatherRecorder::finish)
            .ok_or(SimulationError::Finished {
                nt: self.params.time.nt,
            })?;
        info!(steps = self.current_timestep, "simulation complete");
        Ok(gather)
    }

    fn update_velocities(&mut self) {
        let dt = self.params.time.dt;
        let c = self.params.order.coefficients();
        let execution = self.params.execution;
        let pressure = &self.wavefield.pressure;

        // dVx/dt = -b * dP/dx at (i+1/2, k)
        let bx = self.model.buoyancy_x();
        let scale_x = dt / self.grid.dx;
        self.wavefield.vx.update(execution, |(i, k), v| {
            v - scale_x * bx.at(i, k) * stencil::forward(pressure, Axis::X, i, k, c)
        });

        // dVz/dt = -b * dP/dz at (i, k+1/2)
        let bz = self.model.buoyancy_z();
        let scale_z = dt / self.grid.dz;
        self.wavefield.vz.update(execution, |(i, k), v| {
            v - scale_z * bz.at(i, k) * stencil::forward(pressure, Axis::Z, i, k, c)
        });
    }

    fn update_pressure(&mut self) {
        let dt = self.params.time.dt;
        let c = self.params.order.coefficients();
        let (dx, dz) = (self.grid.dx, self.grid.dz);
        let vx = &self.wavefield.vx;
        let vz = &self.wavefield.vz;
        let bulk = self.model.bulk_modulus();

        // dP/dt = -K * (dVx/dx + dVz/dz) at (i, k)
        self.wavefield.pressure.update(self.params.execution, |(i, k), p| {
            let divergence = stencil::backward(vx, Axis::X, i, k, c) / dx
                + stencil::backward(vz, Axis::Z, i, k, c) / dz;
            p - dt * bulk.at(i, k) * divergence
        });
    }

    fn apply_sources(&mut self, step: usize) {
        let dt = self.params.time.dt;
        for source in &self.sources {
            source.inject(&mut self.wavefield, &self.model, &self.grid, step, dt);
        }
    }
}
