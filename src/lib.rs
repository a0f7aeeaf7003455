// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! A fast marching solver for the eikonal equation on N-dimensional grids.
//!
//! Arrival times `T` satisfying `|grad T| = 1 / F` are computed from a set
//! of seed cells by sweeping a front outward in order of increasing arrival
//! time, with a first-order upwind quadratic solve at every cell. The upwind
//! extension additionally builds the gradient of `T` as cells are finalized
//! and can stop the front shortly after designated target cells are reached.

#![warn(missing_docs)]

/// Grid containers, cell labels, and seed nodes.
pub mod core;
/// Error types for the library.
pub mod error;
/// File I/O for speed fields and solver outputs.
pub mod io;
/// The fast marching engine.
pub mod marching;
/// Indexed priority queue of trial cells.
pub mod queue;
/// Local upwind quadratic solve.
pub mod update_kernels;
/// Upwind gradient generation and target stopping.
pub mod upwind;
/// Constant-time neighborhood access over row-major grids.
pub mod window;

pub use crate::core::{Grid, GridGeometry, GridShape, Label, Node};
pub use crate::error::{FastMarchingError, Result};
pub use crate::marching::{
    FastMarchingSolver, MarchingOutput, NoopHook, ProgressInfo, PromotedCell, Promotion,
    PromotionHook, RunState,
};
pub use crate::upwind::{TargetReachedMode, UpwindGradientSolver, UpwindOutput};
