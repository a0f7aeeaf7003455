// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;
use std::str::FromStr;

use log::debug;

use crate::core::{Grid, GridGeometry, GridShape, Label, Node};
use crate::error::{FastMarchingError, Result};
use crate::marching::{FastMarchingSolver, MarchingOutput, PromotedCell, Promotion, PromotionHook};

/// When the target policy stops the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetReachedMode {
    /// Never stop on targets. The target value tracks the front.
    #[default]
    NoTargets,
    /// Stop after the first target is reached.
    OneTarget,
    /// Stop after the given number of targets are reached.
    SomeTargets(usize),
    /// Stop after every target is reached.
    AllTargets,
}

impl FromStr for TargetReachedMode {
    type Err = FastMarchingError;

    /// Parse `none`, `one`, `all`, or `some:<n>`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(TargetReachedMode::NoTargets),
            "one" => Ok(TargetReachedMode::OneTarget),
            "all" => Ok(TargetReachedMode::AllTargets),
            _ => {
                let count = s
                    .strip_prefix("some:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| {
                        FastMarchingError::Other(format!(
                            "invalid target mode '{}' (expected none, one, all, or some:<n>)",
                            s
                        ))
                    })?;
                Ok(TargetReachedMode::SomeTargets(count))
            }
        }
    }
}

/// Upwind finite-difference gradient of the arrival time at one cell.
///
/// `neighbors[axis]` holds the backward and forward neighbor values along
/// that axis, `None` where the neighbor is not alive. Both present gives a
/// central difference, one present a one-sided difference, none a zero
/// component.
pub fn upwind_gradient<const N: usize>(
    center: f64,
    neighbors: &[[Option<f64>; 2]; N],
    spacing: [f64; N],
) -> [f64; N] {
    let mut gradient = [0.0; N];
    for axis in 0..N {
        let h = spacing[axis];
        gradient[axis] = match neighbors[axis] {
            [Some(back), Some(fwd)] => (fwd - back) / (2.0 * h),
            [Some(back), None] => (center - back) / h,
            [None, Some(fwd)] => (fwd - center) / h,
            [None, None] => 0.0,
        };
    }
    gradient
}

/// Result of an upwind gradient solve.
#[derive(Debug, Clone)]
pub struct UpwindOutput<const N: usize> {
    /// Arrival times, labels, and run state.
    pub marching: MarchingOutput<N>,
    /// Gradient of the arrival time at every cell promoted during
    /// propagation; zero elsewhere. `None` unless gradient generation is on.
    pub gradient: Option<Grid<[f64; N], N>>,
    /// Targets that became alive, in the order they were reached.
    pub reached_targets: Vec<Node<N>>,
    /// Arrival time at which the target policy triggered, or the largest
    /// promoted value with [`TargetReachedMode::NoTargets`]. Zero if the
    /// policy never triggered.
    pub target_value: f64,
}

/// Fast marching that also builds the upwind gradient of the arrival time
/// and can stop once target cells are reached.
///
/// On trigger the stopping value becomes `min(stopping, target_value +
/// target_offset)`, so the front runs a little past the targets.
pub struct UpwindGradientSolver<const N: usize> {
    marcher: FastMarchingSolver<N>,
    target_points: Vec<Node<N>>,
    target_offset: f64,
    target_reached_mode: TargetReachedMode,
    generate_gradient: bool,
}

impl<const N: usize> UpwindGradientSolver<N> {
    /// Wrap a configured fast marching solver.
    pub fn new(marcher: FastMarchingSolver<N>) -> Self {
        UpwindGradientSolver {
            marcher,
            target_points: Vec::new(),
            target_offset: 1.0,
            target_reached_mode: TargetReachedMode::NoTargets,
            generate_gradient: false,
        }
    }

    /// Set the target cells (builder method).
    pub fn with_target_points(mut self, points: &[Node<N>]) -> Self {
        self.set_target_points(points);
        self
    }

    /// Extra arrival time to propagate past the trigger (builder method).
    /// Default is 1.0.
    ///
    /// # Errors
    /// Returns an error if the offset is negative or not finite.
    pub fn with_target_offset(mut self, offset: f64) -> Result<Self> {
        if !offset.is_finite() || offset < 0.0 {
            return Err(FastMarchingError::InvalidTargetOffset(offset));
        }
        self.target_offset = offset;
        Ok(self)
    }

    /// Set the stopping policy (builder method).
    pub fn with_target_reached_mode(mut self, mode: TargetReachedMode) -> Self {
        self.target_reached_mode = mode;
        self
    }

    /// Compute the gradient field (builder method). Default is off.
    pub fn with_generate_gradient(mut self, generate: bool) -> Self {
        self.generate_gradient = generate;
        self
    }

    /// Replace the target cells.
    pub fn set_target_points(&mut self, points: &[Node<N>]) {
        self.target_points = points.to_vec();
    }

    /// Target cells.
    pub fn target_points(&self) -> &[Node<N>] {
        &self.target_points
    }

    /// Target offset.
    pub fn target_offset(&self) -> f64 {
        self.target_offset
    }

    /// Stopping policy.
    pub fn target_reached_mode(&self) -> TargetReachedMode {
        self.target_reached_mode
    }

    /// The wrapped fast marching solver.
    pub fn marcher(&self) -> &FastMarchingSolver<N> {
        &self.marcher
    }

    /// Mutable access to the wrapped solver, for example to reseed it.
    pub fn marcher_mut(&mut self) -> &mut FastMarchingSolver<N> {
        &mut self.marcher
    }

    fn validate_targets(&self) -> Result<()> {
        let available = self.target_points.len();
        match self.target_reached_mode {
            TargetReachedMode::NoTargets => Ok(()),
            _ if available == 0 => Err(FastMarchingError::NoTargetPoints),
            TargetReachedMode::SomeTargets(requested)
                if requested == 0 || requested > available =>
            {
                Err(FastMarchingError::InvalidTargetCount {
                    requested,
                    available,
                })
            }
            _ => Ok(()),
        }
    }

    /// Run the solve.
    ///
    /// # Errors
    /// Returns an error if the domain or the target policy is misconfigured.
    pub fn solve(&self) -> Result<UpwindOutput<N>> {
        self.validate_targets()?;
        let shape = self.marcher.domain_shape()?;

        let domain = GridShape::new(shape)?;
        let mut targets = HashSet::with_capacity(self.target_points.len());
        for node in &self.target_points {
            match domain.checked_index(&node.index) {
                Some(index) => {
                    targets.insert(index);
                }
                None => debug!("dropping out-of-range target {:?}", node.index),
            }
        }

        let required = match self.target_reached_mode {
            TargetReachedMode::NoTargets => None,
            TargetReachedMode::OneTarget => Some(1),
            TargetReachedMode::SomeTargets(n) => Some(n),
            TargetReachedMode::AllTargets => (!targets.is_empty()).then_some(targets.len()),
        };

        let mut hook = UpwindHook {
            domain,
            gradient: self
                .generate_gradient
                .then(|| vec![[0.0; N]; domain.num_cells()]),
            targets,
            reached: Vec::new(),
            required,
            track_front: self.target_reached_mode == TargetReachedMode::NoTargets,
            offset: self.target_offset,
            triggered: false,
            target_value: 0.0,
        };
        let marching = self.marcher.solve_with(&mut hook)?;

        if hook.triggered {
            debug!(
                "target policy {:?} triggered at {:.6} after {} targets",
                self.target_reached_mode,
                hook.target_value,
                hook.reached.len()
            );
        }

        let gradient = match hook.gradient {
            Some(data) => Some(Grid::new(shape, data)?),
            None => None,
        };
        Ok(UpwindOutput {
            marching,
            gradient,
            reached_targets: hook.reached,
            target_value: hook.target_value,
        })
    }
}

struct UpwindHook<const N: usize> {
    domain: GridShape<N>,
    gradient: Option<Vec<[f64; N]>>,
    targets: HashSet<[usize; N]>,
    reached: Vec<Node<N>>,
    required: Option<usize>,
    track_front: bool,
    offset: f64,
    triggered: bool,
    target_value: f64,
}

impl<const N: usize> PromotionHook<N> for UpwindHook<N> {
    fn promote(&mut self, cell: &PromotedCell<'_, N>) -> Promotion {
        if let Some(gradient) = self.gradient.as_mut() {
            let mut neighbors = [[None; 2]; N];
            for (axis, pair) in neighbors.iter_mut().enumerate() {
                for (side, forward) in [false, true].into_iter().enumerate() {
                    let (label, value) = cell.neighbor(axis, forward);
                    if label == Label::Alive {
                        pair[side] = Some(value);
                    }
                }
            }
            gradient[self.domain.nd_to_flat(cell.index)] =
                upwind_gradient(cell.value, &neighbors, cell.spacing);
        }

        if self.track_front {
            self.target_value = cell.value;
        }
        if !self.targets.remove(&cell.index) {
            return Promotion::Continue;
        }
        self.reached.push(Node::at(cell.index, cell.value));

        match self.required {
            Some(required) if !self.triggered && self.reached.len() >= required => {
                self.triggered = true;
                self.target_value = cell.value;
                Promotion::StopAfter(cell.value + self.offset)
            }
            _ => Promotion::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marching::RunState;

    fn plane(size: usize) -> FastMarchingSolver<2> {
        FastMarchingSolver::new()
            .with_output_size([size, size])
            .unwrap()
            .with_alive_points(&[Node::new([0, 0], 0.0)])
    }

    #[test]
    fn gradient_differences() {
        let g = upwind_gradient(1.0, &[[Some(0.0), Some(2.5)], [Some(0.5), None]], [1.0, 0.5]);
        assert!((g[0] - 1.25).abs() < 1e-12);
        assert!((g[1] - 1.0).abs() < 1e-12);

        let g = upwind_gradient(1.0, &[[None, Some(3.0)], [None, None]], [2.0, 1.0]);
        assert_eq!(g, [1.0, 0.0]);
    }

    #[test]
    fn parse_target_modes() {
        assert_eq!("none".parse::<TargetReachedMode>().unwrap(), TargetReachedMode::NoTargets);
        assert_eq!("one".parse::<TargetReachedMode>().unwrap(), TargetReachedMode::OneTarget);
        assert_eq!("all".parse::<TargetReachedMode>().unwrap(), TargetReachedMode::AllTargets);
        assert_eq!(
            "some:3".parse::<TargetReachedMode>().unwrap(),
            TargetReachedMode::SomeTargets(3)
        );
        assert!("some:x".parse::<TargetReachedMode>().is_err());
        assert!("many".parse::<TargetReachedMode>().is_err());
    }

    #[test]
    fn one_target_stops_after_offset() {
        let out = UpwindGradientSolver::new(plane(20))
            .with_target_points(&[Node::new([5, 0], 0.0)])
            .with_target_offset(1.5)
            .unwrap()
            .with_target_reached_mode(TargetReachedMode::OneTarget)
            .solve()
            .unwrap();
        assert_eq!(out.marching.state, RunState::TargetReached);
        assert!((out.target_value - 5.0).abs() < 1e-12);
        assert_eq!(out.reached_targets, vec![Node::new([5, 0], 5.0)]);
        assert_eq!(out.marching.stopping_value, 6.5);
        assert_eq!(*out.marching.labels.get([6, 0]), Label::Alive);
        assert_ne!(*out.marching.labels.get([7, 0]), Label::Alive);
    }

    #[test]
    fn no_targets_tracks_the_front() {
        let out = UpwindGradientSolver::new(plane(6))
            .with_target_points(&[Node::new([1, 1], 0.0)])
            .solve()
            .unwrap();
        assert_eq!(out.marching.state, RunState::QueueExhausted);
        let max = out
            .marching
            .arrival
            .as_slice()
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(out.target_value, max);
        assert_eq!(out.reached_targets.len(), 1);
    }

    #[test]
    fn duplicate_and_out_of_range_targets() {
        let targets = [
            Node::new([3, 0], 0.0),
            Node::new([3, 0], 0.0),
            Node::new([50, 50], 0.0),
            Node::new([0, 4], 0.0),
        ];
        let out = UpwindGradientSolver::new(plane(10))
            .with_target_points(&targets)
            .with_target_offset(0.0)
            .unwrap()
            .with_target_reached_mode(TargetReachedMode::AllTargets)
            .solve()
            .unwrap();
        assert_eq!(out.reached_targets.len(), 2);
        assert_eq!(out.reached_targets[0].index, [3, 0]);
        assert!((out.target_value - 4.0).abs() < 1e-12);
        assert_eq!(out.marching.state, RunState::TargetReached);
    }

    #[test]
    fn gradient_only_at_promoted_cells() {
        let out = UpwindGradientSolver::new(plane(5))
            .with_generate_gradient(true)
            .solve()
            .unwrap();
        let gradient = out.gradient.unwrap();
        assert_eq!(*gradient.get([0, 0]), [0.0, 0.0]);
        let g = gradient.get([3, 0]);
        assert!((g[0] - 1.0).abs() < 1e-12);
        assert!(g[1].abs() < 1e-12 || g[1] > 0.0);
    }

    #[test]
    fn gradient_is_off_by_default() {
        let out = UpwindGradientSolver::new(plane(4)).solve().unwrap();
        assert!(out.gradient.is_none());
    }

    #[test]
    fn target_validation() {
        assert!(matches!(
            UpwindGradientSolver::new(plane(4))
                .with_target_reached_mode(TargetReachedMode::AllTargets)
                .solve(),
            Err(FastMarchingError::NoTargetPoints)
        ));
        assert!(matches!(
            UpwindGradientSolver::new(plane(4))
                .with_target_points(&[Node::new([1, 1], 0.0)])
                .with_target_reached_mode(TargetReachedMode::SomeTargets(2))
                .solve(),
            Err(FastMarchingError::InvalidTargetCount {
                requested: 2,
                available: 1
            })
        ));
        assert!(matches!(
            UpwindGradientSolver::new(plane(4)).with_target_offset(-1.0),
            Err(FastMarchingError::InvalidTargetOffset(_))
        ));
    }
}
