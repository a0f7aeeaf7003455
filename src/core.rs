// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use crate::error::{FastMarchingError, Result};

/// Index geometry of a dense row-major grid: shape, strides, and index
/// conversion utilities.
pub trait GridGeometry<const N: usize> {
    /// Get the grid shape (number of cells along each axis).
    fn shape(&self) -> [usize; N];

    /// Get the row-major strides for index computation. The last axis is
    /// contiguous.
    fn strides(&self) -> [usize; N];

    /// Get the total number of cells in the grid.
    fn num_cells(&self) -> usize {
        self.shape().iter().product()
    }

    /// Convert an N-dimensional index to a flat index.
    #[allow(clippy::needless_range_loop)]
    fn nd_to_flat(&self, idx: [usize; N]) -> usize {
        let strides = self.strides();
        let mut flat = 0;
        for d in 0..N {
            flat += idx[d] * strides[d];
        }
        flat
    }

    /// Convert a flat index to an N-dimensional index.
    #[allow(clippy::needless_range_loop)]
    fn flat_to_nd(&self, flat: usize) -> [usize; N] {
        let strides = self.strides();
        let mut idx = [0usize; N];
        let mut remainder = flat;
        for d in 0..N {
            idx[d] = remainder / strides[d];
            remainder %= strides[d];
        }
        idx
    }

    /// Map a possibly out-of-domain signed index to a grid index.
    /// Returns `None` if any component falls outside the grid.
    fn checked_index(&self, idx: &[i64; N]) -> Option<[usize; N]> {
        let shape = self.shape();
        let mut out = [0usize; N];
        for (d, (&i, &size)) in idx.iter().zip(shape.iter()).enumerate() {
            let i = usize::try_from(i).ok()?;
            if i >= size {
                return None;
            }
            out[d] = i;
        }
        Some(out)
    }
}

/// Row-major strides for a shape.
pub fn row_major_strides<const N: usize>(shape: [usize; N]) -> [usize; N] {
    let mut strides = [0usize; N];
    if N == 0 {
        return strides;
    }
    strides[N - 1] = 1;
    for d in (0..N - 1).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

/// Reject shapes with an empty axis.
pub fn validate_shape<const N: usize>(shape: [usize; N]) -> Result<()> {
    for (axis, &size) in shape.iter().enumerate() {
        if size == 0 {
            return Err(FastMarchingError::InvalidGridShape { axis, size });
        }
    }
    Ok(())
}

/// Shape and strides of a grid without any cell storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape<const N: usize> {
    shape: [usize; N],
    strides: [usize; N],
}

impl<const N: usize> GridShape<N> {
    /// Create the geometry for `shape`.
    ///
    /// # Errors
    /// Returns an error if an axis is empty.
    pub fn new(shape: [usize; N]) -> Result<Self> {
        validate_shape(shape)?;
        Ok(GridShape {
            shape,
            strides: row_major_strides(shape),
        })
    }
}

impl<const N: usize> GridGeometry<N> for GridShape<N> {
    fn shape(&self) -> [usize; N] {
        self.shape
    }

    fn strides(&self) -> [usize; N] {
        self.strides
    }
}

/// A dense N-dimensional array with contiguous row-major storage.
///
/// Used for the speed input as well as the arrival time, label, and gradient
/// outputs of a marching run.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T, const N: usize> {
    shape: [usize; N],
    strides: [usize; N],
    data: Vec<T>,
}

impl<T, const N: usize> Grid<T, N> {
    /// Wrap row-major data in a grid of the given shape.
    ///
    /// # Errors
    /// Returns an error if an axis is empty or if the data length does not
    /// match the product of the shape.
    pub fn new(shape: [usize; N], data: Vec<T>) -> Result<Self> {
        assert!(N >= 1, "Grid requires at least one axis");
        validate_shape(shape)?;
        let num_cells: usize = shape.iter().product();
        if data.len() != num_cells {
            return Err(FastMarchingError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Grid {
            shape,
            strides: row_major_strides(shape),
            data,
        })
    }

    /// Get a reference to the value at the given index.
    pub fn get(&self, idx: [usize; N]) -> &T {
        &self.data[self.nd_to_flat(idx)]
    }

    /// Get a reference to the value at a signed index, or `None` if it is
    /// outside the grid.
    pub fn try_get(&self, idx: &[i64; N]) -> Option<&T> {
        self.checked_index(idx).map(|i| self.get(i))
    }

    /// Overwrite the value at the given index.
    pub fn set(&mut self, idx: [usize; N], value: T) {
        let flat = self.nd_to_flat(idx);
        self.data[flat] = value;
    }

    /// Row-major view of the data.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major view of the data.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the grid and return its row-major data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Iterate over `(index, value)` pairs in row-major order.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ([usize; N], &T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(move |(flat, v)| (self.flat_to_nd(flat), v))
    }
}

impl<T: Clone, const N: usize> Grid<T, N> {
    /// Create a grid with every cell set to `value`.
    ///
    /// # Errors
    /// Returns an error if an axis is empty.
    pub fn filled(shape: [usize; N], value: T) -> Result<Self> {
        validate_shape(shape)?;
        let num_cells: usize = shape.iter().product();
        Grid::new(shape, vec![value; num_cells])
    }
}

impl<T, const N: usize> GridGeometry<N> for Grid<T, N> {
    fn shape(&self) -> [usize; N] {
        self.shape
    }

    fn strides(&self) -> [usize; N] {
        self.strides
    }

    fn num_cells(&self) -> usize {
        self.data.len()
    }
}

/// A grid cell coordinate paired with a scalar value.
///
/// As a seed the value is the initial arrival time; in outputs it is the
/// arrival time assigned by the solver. Coordinates are signed so that
/// out-of-domain seeds can be expressed (they are ignored).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<const N: usize> {
    /// Cell coordinate.
    pub index: [i64; N],
    /// Arrival time or seed value.
    pub value: f64,
}

impl<const N: usize> Node<N> {
    /// Create a node.
    pub fn new(index: [i64; N], value: f64) -> Self {
        Node { index, value }
    }

    /// Create a node from an unsigned grid index.
    pub fn at(index: [usize; N], value: f64) -> Self {
        Node {
            index: index.map(|i| i as i64),
            value,
        }
    }
}

/// Fast marching state of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Label {
    /// Not yet reached by the front.
    #[default]
    Far = 0,
    /// Arrival time is final.
    Alive = 1,
    /// Tentative arrival time, queued for promotion.
    Trial = 2,
    /// Caller-supplied trial seed; its value is never recomputed.
    InitialTrial = 3,
    /// Excluded from the computation.
    Outside = 4,
}

impl Label {
    /// Numeric code used when labels are exported.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the cell's value may be used by a neighbor's local solve.
    pub fn is_known(self) -> bool {
        matches!(self, Label::Alive | Label::InitialTrial)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Far => "Far",
            Label::Alive => "Alive",
            Label::Trial => "Trial",
            Label::InitialTrial => "InitialTrial",
            Label::Outside => "Outside",
        };
        f.write_str(name)
    }
}
