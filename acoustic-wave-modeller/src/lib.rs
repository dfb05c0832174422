//! 2-D acoustic wave modelling on a staggered grid.
//!
//! Solves the first-order velocity-pressure acoustic equations with an
//! explicit leapfrog scheme (2nd or 4th order in space), absorbing sponge
//! boundaries, an optional free surface following topography and bilinear
//! source/receiver interpolation, producing pressure shot gathers.

pub mod boundary;
pub mod config;
pub mod error;
pub mod grid;
pub mod interpolation;
pub mod io;
pub mod model;
pub mod receiver;
pub mod simulation;
pub mod source;
pub mod stability;
pub mod staggered;
pub mod stencil;
pub mod surface;
pub mod survey;
pub mod wavefield;

pub use boundary::BoundaryConfig;
pub use error::{ConfigurationError, DivergenceError, IoError, SimulationError};
pub use grid::{Grid, GridPosition, TimeAxis};
pub use model::{Layer, Model};
pub use receiver::{Gather, ReceiverArray};
pub use simulation::{CancellationToken, Simulation, SimulationParams, SimulationState};
pub use source::{Source, SourceKind, Wavelet};
pub use stability::DivergenceGuard;
pub use staggered::Execution;
pub use stencil::SpaceOrder;
pub use surface::Topography;
pub use survey::{Shot, Survey};
pub use wavefield::Wavefield;
