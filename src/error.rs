// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur during solver configuration, propagation, or I/O.
#[derive(Debug)]
pub enum FastMarchingError {
    /// Grid shape is invalid (an axis has no cells).
    InvalidGridShape {
        /// The axis index.
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Array shape does not match expected shape.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Neither a speed grid nor an output size was configured.
    MissingOutputSize,
    /// Grid spacing is not positive and finite.
    InvalidGridSpacing {
        /// The axis index.
        axis: usize,
        /// The spacing provided.
        spacing: f64,
    },
    /// Normalization factor is not positive and finite.
    InvalidNormalizationFactor(f64),
    /// Stopping value is NaN.
    InvalidStoppingValue(f64),
    /// Target offset is negative or not finite.
    InvalidTargetOffset(f64),
    /// The target reached mode needs target points but none were supplied.
    NoTargetPoints,
    /// The number of targets requested cannot be satisfied.
    InvalidTargetCount {
        /// Number of targets the mode waits for.
        requested: usize,
        /// Number of target points supplied.
        available: usize,
    },
    /// Extraction from an empty priority queue.
    EmptyQueue,
    /// Slowness value is not positive and finite.
    InvalidSlowness {
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for FastMarchingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastMarchingError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has size {} (must be >= 1)",
                    axis, size
                )
            }
            FastMarchingError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            FastMarchingError::MissingOutputSize => {
                write!(f, "no speed grid or output size configured")
            }
            FastMarchingError::InvalidGridSpacing { axis, spacing } => {
                write!(
                    f,
                    "invalid grid spacing on axis {}: {} (must be positive and finite)",
                    axis, spacing
                )
            }
            FastMarchingError::InvalidNormalizationFactor(factor) => {
                write!(
                    f,
                    "invalid normalization factor: {} (must be positive and finite)",
                    factor
                )
            }
            FastMarchingError::InvalidStoppingValue(value) => {
                write!(f, "invalid stopping value: {}", value)
            }
            FastMarchingError::InvalidTargetOffset(offset) => {
                write!(
                    f,
                    "invalid target offset: {} (must be non-negative and finite)",
                    offset
                )
            }
            FastMarchingError::NoTargetPoints => {
                write!(f, "target reached mode requires at least one target point")
            }
            FastMarchingError::InvalidTargetCount {
                requested,
                available,
            } => {
                write!(
                    f,
                    "invalid target count: waiting for {} of {} target points",
                    requested, available
                )
            }
            FastMarchingError::EmptyQueue => write!(f, "extract from empty trial queue"),
            FastMarchingError::InvalidSlowness { index, value } => {
                write!(
                    f,
                    "invalid slowness at index {}: {} (must be positive and finite)",
                    index, value
                )
            }
            FastMarchingError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            FastMarchingError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            FastMarchingError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            FastMarchingError::IoError(e) => write!(f, "I/O error: {}", e),
            FastMarchingError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FastMarchingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FastMarchingError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FastMarchingError {
    fn from(e: std::io::Error) -> Self {
        FastMarchingError::IoError(e)
    }
}

/// Convenience type alias for Results with FastMarchingError.
pub type Result<T> = std::result::Result<T, FastMarchingError>;
