use ndarray::{Array2, ArrayView1, Axis};

use crate::error::ConfigurationError;
use crate::grid::{Grid, GridPosition};
use crate::staggered::{Centered, StaggeredField};

/// Ordered receiver positions; trace `r` of a gather belongs to `positions[r]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReceiverArray {
    positions: Vec<GridPosition>,
}

impl ReceiverArray {
    pub fn new(positions: Vec<GridPosition>) -> Self {
        Self { positions }
    }

    /// `count` receivers evenly spaced from `start` to `end` inclusive.
    pub fn line(start: GridPosition, end: GridPosition, count: usize) -> Self {
        let positions = match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => (0..count)
                .map(|n| {
                    let s = n as f64 / (count - 1) as f64;
                    GridPosition::new(
                        start.x + s * (end.x - start.x),
                        start.z + s * (end.z - start.z),
                    )
                })
                .collect(),
        };
        Self { positions }
    }

    pub fn validate(&self, grid: &Grid) -> Result<(), ConfigurationError> {
        if self.positions.is_empty() {
            return Err(ConfigurationError::Empty("receiver"));
        }
        self.positions
            .iter()
            .try_for_each(|p| p.check_inside(grid, "receiver"))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[GridPosition] {
        &self.positions
    }
}

/// Recorded pressure, one row per time step and one column per receiver.
///
/// Row `n` holds the pressure at `t = (n + 1) * dt`, the end of step `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    data: Array2<f64>,
    dt: f64,
}

/// Largest absolute sample of a trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub step: usize,
    pub time: f64,
    pub value: f64,
}

impl Gather {
    pub fn nt(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_receivers(&self) -> usize {
        self.data.ncols()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Time of row `n`.
    pub fn time(&self, n: usize) -> f64 {
        (n + 1) as f64 * self.dt
    }

    pub fn trace(&self, receiver: usize) -> ArrayView1<'_, f64> {
        self.data.index_axis(Axis(1), receiver)
    }

    /// First sample with the largest magnitude on a trace.
    pub fn peak(&self, receiver: usize) -> Peak {
        let mut best = Peak {
            step: 0,
            time: self.time(0),
            value: 0.0,
        };
        for (step, &value) in self.trace(receiver).iter().enumerate() {
            if value.abs() > best.value.abs() {
                best = Peak {
                    step,
                    time: self.time(step),
                    value,
                };
            }
        }
        best
    }
}

/// Fills a gather row by row while a run is in progress.
#[derive(Debug)]
pub(crate) struct GatherRecorder {
    data: Array2<f64>,
    dt: f64,
}

impl GatherRecorder {
    pub(crate) fn new(nt: usize, n_receivers: usize, dt: f64) -> Self {
        Self {
            data: Array2::zeros((nt, n_receivers)),
            dt,
        }
    }

    /// Samples the pressure at every receiver into row `step`.
    pub(crate) fn record(
        &mut self,
        step: usize,
        pressure: &StaggeredField<Centered>,
        receivers: &ReceiverArray,
    ) {
        let mut row = self.data.row_mut(step);
        for (slot, &p) in row.iter_mut().zip(receivers.positions()) {
            *slot = pressure.sample(p);
        }
    }

    pub(crate) fn finish(self) -> Gather {
        Gather {
            data: self.data,
            dt: self.dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_evenly_spaced() {
        let line = ReceiverArray::line(GridPosition::new(10.0, 2.0), GridPosition::new(20.0, 2.0), 5);
        let xs: Vec<f64> = line.positions().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![10.0, 12.5, 15.0, 17.5, 20.0]);
        assert_eq!(ReceiverArray::line(GridPosition::new(1.0, 1.0), GridPosition::new(2.0, 2.0), 1).len(), 1);
    }

    #[test]
    fn validate_rejects_empty_and_outside() {
        let grid = Grid::new(30, 30, 5.0, 5.0).unwrap();
        assert_eq!(
            ReceiverArray::default().validate(&grid),
            Err(ConfigurationError::Empty("receiver"))
        );
        let outside = ReceiverArray::new(vec![GridPosition::new(3.0, 3.0), GridPosition::new(3.0, 29.5)]);
        assert!(matches!(
            outside.validate(&grid),
            Err(ConfigurationError::OutOfDomain { what: "receiver", .. })
        ));
    }

    #[test]
    fn recorder_samples_bilinearly() {
        let grid = Grid::new(10, 10, 5.0, 5.0).unwrap();
        let pressure = StaggeredField::<Centered>::from_positions(&grid, |p| p.x + 10.0 * p.z);
        let receivers = ReceiverArray::new(vec![GridPosition::new(2.5, 1.0), GridPosition::new(7.0, 3.25)]);
        let mut recorder = GatherRecorder::new(3, 2, 0.01);
        recorder.record(1, &pressure, &receivers);
        let gather = recorder.finish();
        assert_eq!(gather.nt(), 3);
        assert_eq!(gather.n_receivers(), 2);
        assert!((gather.data()[[1, 0]] - 12.5).abs() < 1e-12);
        assert!((gather.data()[[1, 1]] - 39.5).abs() < 1e-12);
        assert_eq!(gather.data()[[0, 0]], 0.0);
    }

    #[test]
    fn peak_finds_largest_magnitude() {
        let mut recorder = GatherRecorder::new(5, 1, 0.002);
        let grid = Grid::new(4, 4, 1.0, 1.0).unwrap();
        let receivers = ReceiverArray::new(vec![GridPosition::new(1.0, 1.0)]);
        for (step, value) in [0.1, -0.7, 0.5, 0.7, 0.0].into_iter().enumerate() {
            let mut p = StaggeredField::<Centered>::zeros(&grid);
            p.data_mut()[[1, 1]] = value;
            recorder.record(step, &p, &receivers);
        }
        let gather = recorder.finish();
        let peak = gather.peak(0);
        assert_eq!(peak.step, 1);
        assert_eq!(peak.value, -0.7);
        assert!((peak.time - 0.004).abs() < 1e-15);
        assert_eq!(gather.trace(0).len(), 5);
    }
}
