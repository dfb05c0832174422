use std::path::Path;

use ndarray::{Array1, Array2, Array3, ArrayD, Axis, Dimension, Ix1, Ix2};
use ndarray_npy::ReadNpyError;

use crate::error::IoError;
use crate::receiver::Gather;
use crate::simulation::Snapshot;

/// Load a 2-D model property from a .npy file, checking it is `(nx, nz)`.
pub fn load_model_array(path: &Path, expected: (usize, usize)) -> Result<Array2<f64>, IoError> {
    read_f64(path, &[expected.0, expected.1])?
        .into_dimensionality::<Ix2>()
        .map_err(|e| read_error(path, e))
}

/// Load `nx` surface depths (metres) from a 1-D .npy file.
pub fn load_surface(path: &Path, nx: usize) -> Result<Array1<f64>, IoError> {
    read_f64(path, &[nx])?
        .into_dimensionality::<Ix1>()
        .map_err(|e| read_error(path, e))
}

// Reads f64 data, or f32 promoted when the file stores single precision.
fn read_f64(path: &Path, expected: &[usize]) -> Result<ArrayD<f64>, IoError> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let arr32: ArrayD<f32> =
                ndarray_npy::read_npy(path).map_err(|e| read_error(path, e))?;
            arr32.mapv(f64::from)
        }
        Err(e) => return Err(read_error(path, e)),
    };

    if arr.shape() != expected {
        return Err(IoError::Shape {
            path: path.to_path_buf(),
            expected: expected.to_vec(),
            got: arr.shape().to_vec(),
        });
    }

    // Fortran-order files come back with a transposed layout
    Ok(arr.as_standard_layout().into_owned())
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> IoError {
    IoError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Save a gather as an `(nt, n_receivers)` array.
pub fn save_gather(gather: &Gather, path: &Path) -> Result<(), IoError> {
    write(path, gather.data())
}

/// Save snapshots stacked along the first axis: `(n_snapshots, nx, nz)`.
pub fn save_snapshots(snapshots: &[Snapshot], path: &Path) -> Result<(), IoError> {
    let Some(first) = snapshots.first() else {
        return write(path, &Array3::<f64>::zeros((0, 0, 0)));
    };
    let (nx, nz) = first.pressure.dim();
    let mut stack = Array3::zeros((snapshots.len(), nx, nz));
    for (mut slot, snap) in stack.axis_iter_mut(Axis(0)).zip(snapshots) {
        if snap.pressure.dim() != (nx, nz) {
            return Err(IoError::Shape {
                path: path.to_path_buf(),
                expected: vec![nx, nz],
                got: snap.pressure.shape().to_vec(),
            });
        }
        slot.assign(&snap.pressure);
    }
    write(path, &stack)
}

fn write<D: Dimension>(path: &Path, arr: &ndarray::Array<f64, D>) -> Result<(), IoError> {
    ndarray_npy::write_npy(path, arr).map_err(|e| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn model_array_roundtrip_and_f32_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.npy");
        let v = array![[1500.0, 1600.0, 1700.0], [1800.0, 1900.0, 2000.0]];
        ndarray_npy::write_npy(&path, &v).unwrap();
        assert_eq!(load_model_array(&path, (2, 3)).unwrap(), v);

        let path32 = dir.path().join("v32.npy");
        ndarray_npy::write_npy(&path32, &v.mapv(|x| x as f32)).unwrap();
        assert_eq!(load_model_array(&path32, (2, 3)).unwrap(), v);
    }

    #[test]
    fn fortran_order_is_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.npy");
        let v = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let fortran = v.t().as_standard_layout().into_owned().reversed_axes();
        assert_eq!(fortran, v);
        ndarray_npy::write_npy(&path, &fortran).unwrap();
        let loaded = load_model_array(&path, (2, 3)).unwrap();
        assert_eq!(loaded, v);
        assert!(loaded.is_standard_layout());
    }

    #[test]
    fn wrong_shape_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.npy");
        ndarray_npy::write_npy(&path, &Array2::<f64>::zeros((4, 5))).unwrap();
        let err = load_model_array(&path, (5, 4)).unwrap_err();
        assert!(matches!(err, IoError::Shape { ref got, .. } if got == &vec![4, 5]));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_model_array(Path::new("/nonexistent/v.npy"), (2, 2)).unwrap_err();
        assert!(matches!(err, IoError::Read { .. }));
    }

    #[test]
    fn truncated_f64_file_reports_its_own_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.npy");
        ndarray_npy::write_npy(&path, &Array2::<f64>::from_elem((8, 8), 1.0)).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 16]).unwrap();

        let err = load_model_array(&path, (8, 8)).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, IoError::Read { .. }));
        assert!(message.contains("EOF"), "{message}");
        assert!(!message.contains("descriptor"), "{message}");
    }

    #[test]
    fn integer_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("i.npy");
        ndarray_npy::write_npy(&path, &array![[1_i32, 2], [3, 4]]).unwrap();
        assert!(matches!(
            load_model_array(&path, (2, 2)),
            Err(IoError::Read { .. })
        ));
    }

    #[test]
    fn surface_depths_are_one_dimensional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.npy");
        let depths = array![0.0_f32, 5.0, 12.5];
        ndarray_npy::write_npy(&path, &depths).unwrap();
        assert_eq!(load_surface(&path, 3).unwrap(), array![0.0, 5.0, 12.5]);

        let err = load_surface(&path, 4).unwrap_err();
        assert!(matches!(err, IoError::Shape { ref expected, .. } if expected == &vec![4]));
    }

    #[test]
    fn snapshots_are_stacked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snaps.npy");
        let snaps: Vec<Snapshot> = (0..3)
            .map(|n| Snapshot {
                step: n * 10,
                time: n as f64,
                pressure: Array2::from_elem((4, 2), n as f64),
            })
            .collect();
        save_snapshots(&snaps, &path).unwrap();
        let loaded: Array3<f64> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(loaded.dim(), (3, 4, 2));
        assert_eq!(loaded[[2, 3, 1]], 2.0);
    }
}
