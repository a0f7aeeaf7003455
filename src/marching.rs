// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::{Duration, Instant};

use log::debug;
use rayon::prelude::*;

use crate::core::{row_major_strides, validate_shape, Grid, GridGeometry, Label, Node};
use crate::error::{FastMarchingError, Result};
use crate::queue::NodeHeap;
use crate::update_kernels::{effective_slowness_sq, solve_upwind, AxisSample};
use crate::window::{copy_region, fill_region, GridWindow};

/// Progress information passed to the optional callback.
#[derive(Debug, Clone, Copy)]
pub struct ProgressInfo {
    /// Completion estimate in `[0, 1]`: front value over the stopping value
    /// when the latter is finite, otherwise the fraction of alive cells.
    pub fraction: f64,
    /// Number of alive cells so far (seeds included).
    pub alive: usize,
    /// Current size of the trial queue.
    pub trial: usize,
    /// Arrival time of the most recently promoted cell.
    pub front_value: f64,
    /// Elapsed time since the solve started.
    pub elapsed: Duration,
}

/// Lifecycle of a single solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has run yet.
    Idle,
    /// Seeds are being placed.
    Seeding,
    /// The front is advancing.
    Propagating,
    /// The next trial value exceeded the configured stopping value.
    Converged,
    /// A promotion hook lowered the stopping value and the front passed it.
    TargetReached,
    /// The trial queue ran dry.
    QueueExhausted,
}

impl RunState {
    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Converged | RunState::TargetReached | RunState::QueueExhausted
        )
    }
}

/// What a [`PromotionHook`] asks of the engine after a promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Promotion {
    /// Keep going.
    Continue,
    /// Stop once the front exceeds the given value. The engine keeps the
    /// smaller of this and its current stopping value.
    StopAfter(f64),
}

/// A cell that just became alive, with read access to its face neighbors.
pub struct PromotedCell<'a, const N: usize> {
    /// Grid index of the cell.
    pub index: [usize; N],
    /// Its final arrival time.
    pub value: f64,
    /// Grid spacing per axis.
    pub spacing: [f64; N],
    window: &'a GridWindow<N>,
    labels: &'a [Label],
    values: &'a [f64],
}

impl<const N: usize> PromotedCell<'_, N> {
    /// Label and value of the face neighbor along `axis`. Neighbors beyond
    /// the grid border read as `Outside` with an infinite value.
    pub fn neighbor(&self, axis: usize, forward: bool) -> (Label, f64) {
        let offset = self.window.offset(self.window.face_slot(axis, forward)) as usize;
        (self.labels[offset], self.values[offset])
    }
}

/// Observer called by the engine each time a queued cell becomes alive.
///
/// Seeds that start alive are not reported.
pub trait PromotionHook<const N: usize> {
    /// Inspect the freshly promoted cell.
    fn promote(&mut self, cell: &PromotedCell<'_, N>) -> Promotion;
}

/// Hook that never intervenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl<const N: usize> PromotionHook<N> for NoopHook {
    fn promote(&mut self, _cell: &PromotedCell<'_, N>) -> Promotion {
        Promotion::Continue
    }
}

/// Result of a fast marching solve.
#[derive(Debug, Clone)]
pub struct MarchingOutput<const N: usize> {
    /// Arrival times; `+inf` where the front never arrived. Trial cells hold
    /// their tentative value.
    pub arrival: Grid<f64, N>,
    /// Final label of every cell.
    pub labels: Grid<Label, N>,
    /// Promoted cells in promotion order, if collection was enabled.
    pub processed: Option<Vec<Node<N>>>,
    /// Terminal state.
    pub state: RunState,
    /// Number of alive cells, seeds included.
    pub alive_count: usize,
    /// Stopping value in effect when the run ended.
    pub stopping_value: f64,
}

/// Fast marching solver for `|grad T| = 1 / F` on a regular N-dimensional
/// grid.
///
/// Seeds and settings are stored in the solver; every call to
/// [`solve`](Self::solve) starts from a fresh workspace, so repeated solves
/// with unchanged inputs give identical results.
pub struct FastMarchingSolver<const N: usize> {
    speed: Option<Grid<f64, N>>,
    output_size: Option<[usize; N]>,
    speed_constant: f64,
    normalization_factor: f64,
    stopping_value: f64,
    spacing: [f64; N],
    collect_points: bool,
    alive_points: Vec<Node<N>>,
    trial_points: Vec<Node<N>>,
    progress_callback: Option<Box<dyn Fn(ProgressInfo) + Send + Sync>>,
    progress_granularity: f64,
}

impl<const N: usize> Default for FastMarchingSolver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FastMarchingSolver<N> {
    /// Create a solver with no speed grid, unit constant speed, unit
    /// spacing, and no stopping value.
    pub fn new() -> Self {
        FastMarchingSolver {
            speed: None,
            output_size: None,
            speed_constant: 1.0,
            normalization_factor: 1.0,
            stopping_value: f64::INFINITY,
            spacing: [1.0; N],
            collect_points: false,
            alive_points: Vec::new(),
            trial_points: Vec::new(),
            progress_callback: None,
            progress_granularity: 0.01,
        }
    }

    /// Use a per-cell speed grid (builder method). Its shape defines the
    /// domain.
    pub fn with_speed(mut self, speed: Grid<f64, N>) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the domain shape used without a speed grid (builder method).
    ///
    /// # Errors
    /// Returns an error if an axis is empty.
    pub fn with_output_size(mut self, size: [usize; N]) -> Result<Self> {
        validate_shape(size)?;
        self.output_size = Some(size);
        self
            .speed
            .as_ref()
            .map_or(Ok(()), |speed| check_same_shape(size, speed.shape()))?;
        Ok(self)
    }

    /// Set the uniform speed used without a speed grid (builder method).
    /// Default is 1.0. A non-positive speed leaves every cell unreachable.
    pub fn with_speed_constant(mut self, speed: f64) -> Self {
        self.speed_constant = speed;
        self
    }

    /// Set the factor every speed is divided by (builder method).
    /// Default is 1.0.
    ///
    /// # Errors
    /// Returns an error if the factor is not positive and finite.
    pub fn with_normalization_factor(mut self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(FastMarchingError::InvalidNormalizationFactor(factor));
        }
        self.normalization_factor = factor;
        Ok(self)
    }

    /// Stop once the front exceeds `value` (builder method). Default is
    /// `+inf`.
    ///
    /// # Errors
    /// Returns an error if the value is NaN.
    pub fn with_stopping_value(mut self, value: f64) -> Result<Self> {
        if value.is_nan() {
            return Err(FastMarchingError::InvalidStoppingValue(value));
        }
        self.stopping_value = value;
        Ok(self)
    }

    /// Set the grid spacing per axis (builder method). Default is 1.0.
    ///
    /// # Errors
    /// Returns an error if a spacing is not positive and finite.
    pub fn with_spacing(mut self, spacing: [f64; N]) -> Result<Self> {
        for (axis, &h) in spacing.iter().enumerate() {
            if !h.is_finite() || h <= 0.0 {
                return Err(FastMarchingError::InvalidGridSpacing { axis, spacing: h });
            }
        }
        self.spacing = spacing;
        Ok(self)
    }

    /// Record promoted cells in order (builder method).
    pub fn with_collect_points(mut self, collect: bool) -> Self {
        self.collect_points = collect;
        self
    }

    /// Set the seeds that start alive (builder method).
    pub fn with_alive_points(mut self, points: &[Node<N>]) -> Self {
        self.set_alive_points(points);
        self
    }

    /// Set the seeds that start in the trial queue (builder method).
    pub fn with_trial_points(mut self, points: &[Node<N>]) -> Self {
        self.set_trial_points(points);
        self
    }

    /// Set a progress callback (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(ProgressInfo) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Minimum fraction increase between progress reports (builder method).
    /// Default is 0.01.
    pub fn with_progress_granularity(mut self, granularity: f64) -> Self {
        self.progress_granularity = granularity;
        self
    }

    /// Replace the alive seeds.
    pub fn set_alive_points(&mut self, points: &[Node<N>]) {
        self.alive_points = points.to_vec();
    }

    /// Replace the trial seeds.
    pub fn set_trial_points(&mut self, points: &[Node<N>]) {
        self.trial_points = points.to_vec();
    }

    /// Alive seeds.
    pub fn alive_points(&self) -> &[Node<N>] {
        &self.alive_points
    }

    /// Trial seeds.
    pub fn trial_points(&self) -> &[Node<N>] {
        &self.trial_points
    }

    /// Configured stopping value.
    pub fn stopping_value(&self) -> f64 {
        self.stopping_value
    }

    /// Grid spacing per axis.
    pub fn spacing(&self) -> [f64; N] {
        self.spacing
    }

    /// Speed normalization factor.
    pub fn normalization_factor(&self) -> f64 {
        self.normalization_factor
    }

    /// Speed used without a speed grid.
    pub fn speed_constant(&self) -> f64 {
        self.speed_constant
    }

    /// The speed grid, if one is set.
    pub fn speed(&self) -> Option<&Grid<f64, N>> {
        self.speed.as_ref()
    }

    /// Shape of the computational domain.
    ///
    /// # Errors
    /// Returns an error if neither a speed grid nor an output size is set,
    /// or if both are set with different shapes.
    pub fn domain_shape(&self) -> Result<[usize; N]> {
        match (&self.speed, self.output_size) {
            (Some(speed), Some(size)) => {
                check_same_shape(size, speed.shape())?;
                Ok(size)
            }
            (Some(speed), None) => Ok(speed.shape()),
            (None, Some(size)) => Ok(size),
            (None, None) => Err(FastMarchingError::MissingOutputSize),
        }
    }

    /// Run fast marching from the stored seeds.
    ///
    /// # Errors
    /// Returns an error if the domain is not configured.
    pub fn solve(&self) -> Result<MarchingOutput<N>> {
        self.solve_with(&mut NoopHook)
    }

    /// Run fast marching, calling `hook` after every promotion.
    ///
    /// # Errors
    /// Returns an error if the domain is not configured.
    pub fn solve_with<H: PromotionHook<N>>(&self, hook: &mut H) -> Result<MarchingOutput<N>> {
        let mut march = March::new(self)?;
        march.seed();
        march.propagate(hook)?;
        march.finish()
    }
}

fn check_same_shape<const N: usize>(expected: [usize; N], got: [usize; N]) -> Result<()> {
    if expected != got {
        return Err(FastMarchingError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

/// Workspace for one solve. Buffers are padded by one cell on every side;
/// the padding is labelled `Outside` so neighbor access never leaves the
/// buffers.
struct March<'s, const N: usize> {
    solver: &'s FastMarchingSolver<N>,
    shape: [usize; N],
    padded_shape: [usize; N],
    padded_strides: [usize; N],
    labels: Vec<Label>,
    values: Vec<f64>,
    slowness_sq: Vec<f64>,
    heap: NodeHeap<usize>,
    window: GridWindow<N>,
    steps: [usize; N],
    inv_h_sq: [f64; N],
    stopping_value: f64,
    target_triggered: bool,
    state: RunState,
    alive_count: usize,
    processed: Option<Vec<Node<N>>>,
    started: Instant,
    last_fraction: f64,
}

impl<'s, const N: usize> March<'s, N> {
    fn new(solver: &'s FastMarchingSolver<N>) -> Result<Self> {
        let shape = solver.domain_shape()?;
        let padded_shape = shape.map(|s| s + 2);
        let padded_len: usize = padded_shape.iter().product();
        let num_cells: usize = shape.iter().product();
        let norm = solver.normalization_factor;

        let interior: Vec<f64> = match &solver.speed {
            Some(speed) => speed
                .as_slice()
                .par_iter()
                .map(|&f| effective_slowness_sq(f, norm))
                .collect(),
            None => vec![effective_slowness_sq(solver.speed_constant, norm); num_cells],
        };
        let mut slowness_sq = vec![f64::INFINITY; padded_len];
        copy_region(
            &interior,
            shape,
            [0; N],
            &mut slowness_sq,
            padded_shape,
            [1; N],
            shape,
        );

        let mut labels = vec![Label::Outside; padded_len];
        fill_region(&mut labels, padded_shape, [1; N], shape, Label::Far);

        let window = GridWindow::new(padded_shape, [1; N]);
        let mut steps = [0usize; N];
        for (axis, step) in steps.iter_mut().enumerate() {
            *step = window.axis_step(axis);
        }

        Ok(March {
            solver,
            shape,
            padded_shape,
            padded_strides: row_major_strides(padded_shape),
            labels,
            values: vec![f64::INFINITY; padded_len],
            slowness_sq,
            heap: NodeHeap::with_key_space(padded_len),
            window,
            steps,
            inv_h_sq: solver.spacing.map(|h| 1.0 / (h * h)),
            stopping_value: solver.stopping_value,
            target_triggered: false,
            state: RunState::Idle,
            alive_count: 0,
            processed: solver.collect_points.then(Vec::new),
            started: Instant::now(),
            last_fraction: 0.0,
        })
    }

    /// Padded linear offset of a grid index, or `None` if out of range.
    fn padded_offset(&self, index: &[i64; N]) -> Option<usize> {
        let mut offset = 0;
        for d in 0..N {
            let i = usize::try_from(index[d]).ok()?;
            if i >= self.shape[d] {
                return None;
            }
            offset += (i + 1) * self.padded_strides[d];
        }
        Some(offset)
    }

    fn padded_index(&self, offset: usize) -> [usize; N] {
        let mut idx = [0usize; N];
        let mut remainder = offset;
        for d in 0..N {
            idx[d] = remainder / self.padded_strides[d];
            remainder %= self.padded_strides[d];
        }
        idx
    }

    fn seed(&mut self) {
        self.state = RunState::Seeding;
        let solver = self.solver;
        let mut dropped = 0usize;

        let mut alive_seeds = Vec::with_capacity(solver.alive_points.len());
        for node in &solver.alive_points {
            match self.padded_offset(&node.index) {
                Some(offset) => {
                    if self.labels[offset] != Label::Alive {
                        self.alive_count += 1;
                    }
                    self.labels[offset] = Label::Alive;
                    self.values[offset] = node.value;
                    alive_seeds.push(offset);
                }
                None => {
                    debug!("dropping out-of-range alive seed {:?}", node.index);
                    dropped += 1;
                }
            }
        }

        for node in &solver.trial_points {
            let Some(offset) = self.padded_offset(&node.index) else {
                debug!("dropping out-of-range trial seed {:?}", node.index);
                dropped += 1;
                continue;
            };
            match self.labels[offset] {
                Label::InitialTrial => {
                    if node.value < self.values[offset] {
                        self.values[offset] = node.value;
                        self.heap.decrease_key(offset, node.value);
                    }
                }
                label => {
                    if label == Label::Alive {
                        self.alive_count -= 1;
                    }
                    self.labels[offset] = Label::InitialTrial;
                    self.values[offset] = node.value;
                    self.heap.insert(node.value, offset);
                }
            }
        }

        for offset in alive_seeds {
            if self.labels[offset] == Label::Alive {
                self.update_neighbors(offset);
            }
        }

        debug!(
            "seeded {} alive and {} trial cells ({} dropped) on {:?}",
            self.alive_count,
            self.heap.len(),
            dropped,
            self.shape
        );
    }

    /// Recompute every face neighbor of `offset` and leave the window
    /// centered on it.
    fn update_neighbors(&mut self, offset: usize) {
        self.window.reposition(self.padded_index(offset));
        for axis in 0..N {
            for forward in [false, true] {
                let neighbor = self.window.offset(self.window.face_slot(axis, forward)) as usize;
                self.update_value(neighbor);
            }
        }
    }

    fn update_value(&mut self, offset: usize) {
        let label = self.labels[offset];
        if !matches!(label, Label::Far | Label::Trial) {
            return;
        }
        let slowness_sq = self.slowness_sq[offset];
        if !slowness_sq.is_finite() {
            return;
        }

        let mut samples = [AxisSample::default(); N];
        let mut count = 0;
        for axis in 0..N {
            let step = self.steps[axis];
            let mut best = f64::INFINITY;
            for neighbor in [offset - step, offset + step] {
                if self.labels[neighbor].is_known() && self.values[neighbor] < best {
                    best = self.values[neighbor];
                }
            }
            if best.is_finite() {
                samples[count] = AxisSample {
                    value: best,
                    inv_h_sq: self.inv_h_sq[axis],
                };
                count += 1;
            }
        }

        let value = solve_upwind(&mut samples[..count], slowness_sq);
        if !value.is_finite() {
            return;
        }
        match label {
            Label::Far => {
                self.labels[offset] = Label::Trial;
                self.values[offset] = value;
                self.heap.insert(value, offset);
            }
            _ => {
                if value < self.values[offset] {
                    self.values[offset] = value;
                    self.heap.decrease_key(offset, value);
                }
            }
        }
    }

    fn propagate<H: PromotionHook<N>>(&mut self, hook: &mut H) -> Result<()> {
        self.state = RunState::Propagating;
        let mut front = f64::NEG_INFINITY;

        loop {
            if self.heap.is_empty() {
                self.state = RunState::QueueExhausted;
                break;
            }
            let entry = self.heap.extract_min()?;
            if entry.time > self.stopping_value {
                self.state = RunState::Converged;
                break;
            }

            let offset = entry.key;
            front = entry.time;
            self.labels[offset] = Label::Alive;
            self.values[offset] = entry.time;
            self.alive_count += 1;

            let padded = self.padded_index(offset);
            let index = padded.map(|i| i - 1);
            if let Some(points) = self.processed.as_mut() {
                points.push(Node::at(index, entry.time));
            }

            self.update_neighbors(offset);

            let decision = {
                let cell = PromotedCell {
                    index,
                    value: entry.time,
                    spacing: self.solver.spacing,
                    window: &self.window,
                    labels: &self.labels,
                    values: &self.values,
                };
                hook.promote(&cell)
            };
            if let Promotion::StopAfter(limit) = decision {
                self.target_triggered = true;
                if limit < self.stopping_value {
                    self.stopping_value = limit;
                }
            }

            self.report_progress(front, false);
        }

        if self.target_triggered {
            self.state = RunState::TargetReached;
        }
        self.report_progress(front, true);
        debug!(
            "fast marching finished: {:?}, {} alive, front {:.6}, {:.3}s",
            self.state,
            self.alive_count,
            front,
            self.started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn report_progress(&mut self, front: f64, finished: bool) {
        let solver = self.solver;
        let Some(callback) = solver.progress_callback.as_ref() else {
            return;
        };
        let fraction = if finished {
            1.0
        } else if self.stopping_value.is_finite() && self.stopping_value > 0.0 {
            (front / self.stopping_value).clamp(0.0, 1.0)
        } else {
            self.alive_count as f64 / self.labels_len() as f64
        };
        if !finished && fraction - self.last_fraction < solver.progress_granularity {
            return;
        }
        self.last_fraction = fraction;
        callback(ProgressInfo {
            fraction,
            alive: self.alive_count,
            trial: self.heap.len(),
            front_value: front,
            elapsed: self.started.elapsed(),
        });
    }

    fn labels_len(&self) -> usize {
        self.shape.iter().product()
    }

    fn finish(self) -> Result<MarchingOutput<N>> {
        let num_cells = self.labels_len();

        let mut arrival = vec![f64::INFINITY; num_cells];
        copy_region(
            &self.values,
            self.padded_shape,
            [1; N],
            &mut arrival,
            self.shape,
            [0; N],
            self.shape,
        );
        let mut labels = vec![Label::Far; num_cells];
        copy_region(
            &self.labels,
            self.padded_shape,
            [1; N],
            &mut labels,
            self.shape,
            [0; N],
            self.shape,
        );

        Ok(MarchingOutput {
            arrival: Grid::new(self.shape, arrival)?,
            labels: Grid::new(self.shape, labels)?,
            processed: self.processed,
            state: self.state,
            alive_count: self.alive_count,
            stopping_value: self.stopping_value,
        })
    }
}
