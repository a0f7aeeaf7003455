// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::core::{Grid, GridGeometry, Label};
use crate::error::{FastMarchingError, Result};

/// Supported file formats for grid I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// NumPy `.npy`.
    Npy,
    /// MATLAB `.mat` (Level 5).
    Mat,
}

/// Infer the file format from the path extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(FastMarchingError::UnsupportedFileFormat(ext.to_string())),
        None => Err(FastMarchingError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Read a real-valued field of the given shape in row-major order.
///
/// `.npy` files may hold `f64` or `f32` data; `.mat` files are searched for
/// `mat_variable`.
pub fn read_field(path: &Path, mat_variable: &str, expected_shape: &[usize]) -> Result<Vec<f64>> {
    match infer_format(path)? {
        FileFormat::Npy => read_npy(path, expected_shape),
        FileFormat::Mat => read_mat(path, mat_variable, expected_shape),
    }
}

fn read_npy(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(_) => {
            let single: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| FastMarchingError::UnsupportedDtype(e.to_string()))?;
            single.mapv(f64::from)
        }
    };
    if arr.shape() != expected_shape {
        return Err(FastMarchingError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: arr.shape().to_vec(),
        });
    }
    // Logical iteration order is row-major even for Fortran-ordered files.
    Ok(arr.iter().copied().collect())
}

fn read_mat(path: &Path, variable: &str, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| FastMarchingError::Other(format!("MAT parse error: {}", e)))?;

    let array = mat.find_by_name(variable).ok_or_else(|| {
        FastMarchingError::MatVariableNotFound {
            expected: variable.to_string(),
            available: mat.arrays().iter().map(|a| a.name().to_string()).collect(),
        }
    })?;

    let column_major: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, .. } => real.clone(),
        matfile::NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        _ => {
            return Err(FastMarchingError::UnsupportedDtype(format!(
                "MAT variable '{}' is not double or single precision",
                variable
            )))
        }
    };

    let mat_shape = array.size().to_vec();
    let mismatch = || FastMarchingError::ShapeMismatch {
        expected: expected_shape.to_vec(),
        got: mat_shape.clone(),
    };
    let num_cells: usize = expected_shape.iter().product();
    if column_major.len() != num_cells {
        return Err(mismatch());
    }

    // MATLAB stores vectors as n x 1 or 1 x n; either order is the same data.
    if expected_shape.len() == 1 && mat_shape.iter().filter(|&&d| d != 1).count() <= 1 {
        return Ok(column_major);
    }

    let reversed: Vec<usize> = expected_shape.iter().rev().copied().collect();
    if mat_shape == expected_shape {
        let arr = ArrayD::from_shape_vec(IxDyn(&mat_shape).f(), column_major)
            .map_err(|e| FastMarchingError::Other(format!("shape error: {}", e)))?;
        Ok(arr.iter().copied().collect())
    } else if mat_shape == reversed {
        // Written by a row-major producer with reversed dimensions: the
        // column-major buffer already is our row-major order.
        Ok(column_major)
    } else {
        Err(mismatch())
    }
}

/// Convert a slowness field to speed (element-wise `1 / s`).
pub fn slowness_to_speed(slowness: &[f64]) -> Result<Vec<f64>> {
    slowness
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if value.is_finite() && value > 0.0 {
                Ok(1.0 / value)
            } else {
                Err(FastMarchingError::InvalidSlowness { index, value })
            }
        })
        .collect()
}

/// Load a speed grid (`.mat` variable `speed`).
pub fn load_speed<const N: usize>(path: &Path, shape: [usize; N]) -> Result<Grid<f64, N>> {
    let data = read_field(path, "speed", &shape)?;
    Grid::new(shape, data)
}

/// Load a slowness grid (`.mat` variable `slowness`) and convert it to
/// speed.
pub fn load_slowness_as_speed<const N: usize>(
    path: &Path,
    shape: [usize; N],
) -> Result<Grid<f64, N>> {
    let slowness = read_field(path, "slowness", &shape)?;
    Grid::new(shape, slowness_to_speed(&slowness)?)
}

/// Write a row-major field, inferring the format from the extension.
pub fn write_field(path: &Path, mat_variable: &str, shape: &[usize], data: Vec<f64>) -> Result<()> {
    let arr = ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| FastMarchingError::Other(format!("shape error: {}", e)))?;
    match infer_format(path)? {
        FileFormat::Npy => ndarray_npy::write_npy(path, &arr)
            .map_err(|e| FastMarchingError::Other(format!("npy write error: {}", e))),
        FileFormat::Mat => {
            let column_major: Vec<f64> = arr.t().iter().copied().collect();
            let mut dims = shape.to_vec();
            if dims.len() == 1 {
                dims.push(1);
            }
            write_mat_level5(path, mat_variable, &dims, &column_major)
        }
    }
}

/// Save arrival times (`.mat` variable `arrival`). Unreached cells are
/// written as `inf`.
pub fn save_arrival_times<const N: usize>(grid: &Grid<f64, N>, path: &Path) -> Result<()> {
    write_field(path, "arrival", &grid.shape(), grid.as_slice().to_vec())
}

/// Save labels as their numeric codes (`.mat` variable `labels`).
pub fn save_labels<const N: usize>(grid: &Grid<Label, N>, path: &Path) -> Result<()> {
    let codes = grid.as_slice().iter().map(|l| f64::from(l.code())).collect();
    write_field(path, "labels", &grid.shape(), codes)
}

/// Save a gradient field (`.mat` variable `gradient`) with the components
/// along a trailing axis of length `N`.
pub fn save_gradient<const N: usize>(grid: &Grid<[f64; N], N>, path: &Path) -> Result<()> {
    let mut shape = grid.shape().to_vec();
    shape.push(N);
    let data = grid.as_slice().iter().flatten().copied().collect();
    write_field(path, "gradient", &shape, data)
}

// Level 5 data types and array class.
const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;

/// Append a tagged data element padded to an 8-byte boundary.
fn push_element(buf: &mut Vec<u8>, data_type: u32, payload: &[u8]) {
    buf.extend_from_slice(&data_type.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let padded = payload.len().div_ceil(8) * 8;
    buf.resize(buf.len() + (padded - payload.len()), 0);
}

/// Write a single real double array as an uncompressed MAT-file Level 5.
///
/// `matfile` only reads, so the writer is kept here. `data` is column-major
/// and `dims` lists the dimensions in the same order as the array shape.
fn write_mat_level5(path: &Path, name: &str, dims: &[usize], data: &[f64]) -> Result<()> {
    let mut header = [b' '; 128];
    let text = b"MATLAB 5.0 MAT-file, created by fast-marching";
    header[..text.len()].copy_from_slice(text);
    header[116..124].fill(0);
    header[124..126].copy_from_slice(&0x0100u16.to_le_bytes());
    header[126..128].copy_from_slice(b"IM");

    let mut matrix = Vec::with_capacity(64 + data.len() * 8);
    let mut flags = Vec::with_capacity(8);
    flags.extend_from_slice(&MX_DOUBLE_CLASS.to_le_bytes());
    flags.extend_from_slice(&0u32.to_le_bytes());
    push_element(&mut matrix, MI_UINT32, &flags);

    let dim_bytes: Vec<u8> = dims.iter().flat_map(|&d| (d as i32).to_le_bytes()).collect();
    push_element(&mut matrix, MI_INT32, &dim_bytes);
    push_element(&mut matrix, MI_INT8, name.as_bytes());

    let real: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    push_element(&mut matrix, MI_DOUBLE, &real);

    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    w.write_all(&header)?;
    w.write_all(&MI_MATRIX.to_le_bytes())?;
    w.write_all(&(matrix.len() as u32).to_le_bytes())?;
    w.write_all(&matrix)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("fast_marching_io_{}", name))
    }

    fn ramp(shape: [usize; 2]) -> Grid<f64, 2> {
        let n = shape[0] * shape[1];
        Grid::new(shape, (0..n).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn npy_arrival_roundtrip() {
        let grid = ramp([3, 5]);
        let path = temp_path("arrival.npy");
        save_arrival_times(&grid, &path).unwrap();
        let loaded = read_field(&path, "arrival", &[3, 5]).unwrap();
        assert_eq!(loaded, grid.as_slice());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn npy_shape_mismatch() {
        let path = temp_path("mismatch.npy");
        save_arrival_times(&ramp([4, 4]), &path).unwrap();
        let result = read_field(&path, "arrival", &[3, 3]);
        assert!(matches!(result, Err(FastMarchingError::ShapeMismatch { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mat_roundtrip_non_square() {
        let grid = ramp([2, 3]);
        let path = temp_path("arrival.mat");
        save_arrival_times(&grid, &path).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut reader = std::io::BufReader::new(file);
        let mat = matfile::MatFile::parse(&mut reader).unwrap();
        let array = mat.find_by_name("arrival").unwrap();
        assert_eq!(array.size().to_vec(), vec![2, 3]);
        match array.data() {
            matfile::NumericData::Double { real, .. } => {
                // Column-major: first column is (0, 3).
                assert_eq!(&real[..2], &[0.0, 3.0]);
            }
            _ => panic!("expected double data"),
        }

        let loaded = read_field(&path, "arrival", &[2, 3]).unwrap();
        assert_eq!(loaded, grid.as_slice());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mat_vector_roundtrip() {
        let grid = Grid::new([4], vec![0.5, 1.5, 2.5, 3.5]).unwrap();
        let path = temp_path("vector.mat");
        save_arrival_times(&grid, &path).unwrap();
        let loaded = read_field(&path, "arrival", &[4]).unwrap();
        assert_eq!(loaded, grid.as_slice());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mat_missing_variable() {
        let path = temp_path("missing.mat");
        save_arrival_times(&ramp([2, 2]), &path).unwrap();
        match read_field(&path, "speed", &[2, 2]) {
            Err(FastMarchingError::MatVariableNotFound { expected, available }) => {
                assert_eq!(expected, "speed");
                assert_eq!(available, vec!["arrival".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn labels_are_written_as_codes() {
        let labels = Grid::new(
            [1, 3],
            vec![Label::Alive, Label::Trial, Label::Far],
        )
        .unwrap();
        let path = temp_path("labels.npy");
        save_labels(&labels, &path).unwrap();
        let loaded = read_field(&path, "labels", &[1, 3]).unwrap();
        assert_eq!(loaded, vec![1.0, 2.0, 0.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn gradient_has_component_axis() {
        let data: Vec<[f64; 2]> = (0..6).map(|i| [i as f64, -(i as f64)]).collect();
        let grid = Grid::new([2, 3], data).unwrap();
        let path = temp_path("gradient.npy");
        save_gradient(&grid, &path).unwrap();
        let loaded = read_field(&path, "gradient", &[2, 3, 2]).unwrap();
        assert_eq!(&loaded[..4], &[0.0, -0.0, 1.0, -1.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn slowness_file_becomes_speed() {
        let slowness = Grid::new([2, 2], vec![1.0, 2.0, 4.0, 0.5]).unwrap();
        let path = temp_path("slowness.npy");
        write_field(&path, "slowness", &[2, 2], slowness.into_vec()).unwrap();
        let speed = load_slowness_as_speed(&path, [2, 2]).unwrap();
        assert_eq!(speed.as_slice(), &[1.0, 0.5, 0.25, 2.0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn invalid_slowness() {
        let result = slowness_to_speed(&[1.0, 0.0, 2.0]);
        assert!(matches!(
            result,
            Err(FastMarchingError::InvalidSlowness { index: 1, .. })
        ));
        assert!(slowness_to_speed(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn unsupported_format() {
        assert!(matches!(
            infer_format(Path::new("speed.xyz")),
            Err(FastMarchingError::UnsupportedFileFormat(_))
        ));
        assert!(infer_format(Path::new("speed")).is_err());
        assert_eq!(infer_format(Path::new("a.mat")).unwrap(), FileFormat::Mat);
    }
}
