use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::grid::Grid;
use crate::model::Model;
use crate::receiver::{Gather, ReceiverArray};
use crate::simulation::{Simulation, SimulationParams, Snapshot};
use crate::source::Source;

/// One experiment: the sources fired together and the receivers listening.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub sources: Vec<Source>,
    pub receivers: ReceiverArray,
}

impl Shot {
    pub fn new(sources: Vec<Source>, receivers: ReceiverArray) -> Self {
        Self { sources, receivers }
    }
}

/// Output of one shot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub gather: Gather,
    pub snapshots: Vec<Snapshot>,
}

/// A set of shots over the same model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Survey {
    shots: Vec<Shot>,
}

impl Survey {
    pub fn new(shots: Vec<Shot>) -> Self {
        Self { shots }
    }

    pub fn push(&mut self, shot: Shot) {
        self.shots.push(shot);
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    /// Runs every shot as its own simulation, in parallel. The model is
    /// shared read-only; each shot owns its wavefield. Results keep shot
    /// order, and the first failing shot's error is returned.
    pub fn run(
        &self,
        grid: Grid,
        model: Arc<Model>,
        params: SimulationParams,
    ) -> Result<Vec<ShotRecord>> {
        info!(shots = self.shots.len(), "running survey");
        self.shots
            .par_iter()
            .enumerate()
            .map(|(idx, shot)| {
                let mut sim = Simulation::new(
                    grid,
                    Arc::clone(&model),
                    params,
                    shot.sources.clone(),
                    shot.receivers.clone(),
                )?;
                let gather = sim.run()?;
                info!(shot = idx, "shot finished");
                Ok(ShotRecord {
                    gather,
                    snapshots: sim.take_snapshots(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryConfig;
    use crate::error::{ConfigurationError, SimulationError};
    use crate::grid::{GridPosition, TimeAxis};
    use crate::source::Wavelet;

    fn setup() -> (Grid, Arc<Model>, SimulationParams) {
        let grid = Grid::new(41, 31, 10.0, 10.0).unwrap();
        let model = Arc::new(Model::homogeneous(&grid, 2000.0, 1000.0).unwrap());
        let params = SimulationParams::new(TimeAxis::new(2e-3, 60).unwrap()).with_boundary(BoundaryConfig {
            width: 8,
            min_factor: 0.9,
            free_surface: false,
        });
        (grid, model, params)
    }

    fn shot(x: f64) -> Shot {
        Shot::new(
            vec![Source::new(GridPosition::new(x, 15.0), Wavelet::ricker(15.0))],
            ReceiverArray::line(GridPosition::new(10.0, 12.0), GridPosition::new(30.0, 12.0), 5),
        )
    }

    #[test]
    fn parallel_survey_matches_individual_runs() {
        let (grid, model, params) = setup();
        let survey = Survey::new(vec![shot(12.0), shot(20.0), shot(28.0)]);
        let records = survey.run(grid, Arc::clone(&model), params).unwrap();
        assert_eq!(records.len(), 3);

        for (record, s) in records.iter().zip(survey.shots()) {
            let mut sim =
                Simulation::new(grid, Arc::clone(&model), params, s.sources.clone(), s.receivers.clone()).unwrap();
            assert_eq!(record.gather, sim.run().unwrap());
        }
        // symmetric shots about the centre give mirrored gathers
        let scale = records[0].gather.peak(0).value.abs();
        assert!(scale > 0.0);
        let left = records[0].gather.trace(0);
        let right = records[2].gather.trace(4);
        for (a, b) in left.iter().zip(right.iter()) {
            assert!((a - b).abs() <= 1e-9 * scale);
        }
    }

    #[test]
    fn bad_shot_fails_the_survey() {
        let (grid, model, params) = setup();
        let survey = Survey::new(vec![shot(20.0), shot(45.0)]);
        let err = survey.run(grid, model, params).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Configuration(ConfigurationError::OutOfDomain { what: "source", .. })
        ));
    }
}
