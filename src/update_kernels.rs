// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

/// The smallest known neighbor value along one axis, with that axis's
/// inverse squared spacing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSample {
    /// Known arrival time of the upwind neighbor.
    pub value: f64,
    /// `1 / h^2` for the axis spacing `h`.
    pub inv_h_sq: f64,
}

impl AxisSample {
    /// Sample for a neighbor `value` on an axis with spacing `h`.
    pub fn new(value: f64, h: f64) -> Self {
        AxisSample {
            value,
            inv_h_sq: 1.0 / (h * h),
        }
    }
}

/// Smallest effective speed the solver distinguishes. Positive speeds below
/// it are raised to it, so the squared slowness and the arrival times built
/// from it stay finite.
pub const MIN_SPEED: f64 = 1e-100;

/// Squared slowness `1 / F^2` for a raw speed after normalization.
///
/// Non-positive (or NaN) speeds give infinite slowness: such cells are never
/// reached by the front. Positive speeds are floored at [`MIN_SPEED`].
#[inline]
pub fn effective_slowness_sq(speed: f64, normalization: f64) -> f64 {
    let f = speed / normalization;
    if f > 0.0 {
        let f = f.max(MIN_SPEED);
        1.0 / (f * f)
    } else {
        f64::INFINITY
    }
}

/// Larger root of `aa * t^2 - 2 * bb * t + cc = 0`.
///
/// Returns `None` if the discriminant is negative or `aa` is not positive, or
/// if the root overflows.
#[inline]
pub fn quadratic_root(aa: f64, bb: f64, cc: f64) -> Option<f64> {
    if aa <= 0.0 {
        return None;
    }
    let disc = bb * bb - aa * cc;
    if disc.is_nan() || disc < 0.0 {
        return None;
    }
    let root = (disc.sqrt() + bb) / aa;
    root.is_finite().then_some(root)
}

/// Solve the first-order upwind discretization of `|grad T| = 1 / F` for one
/// cell.
///
/// `samples` holds one entry per axis that has a known neighbor (the smaller
/// of the two if both are known). The samples are sorted in place by value
/// and folded into the quadratic one at a time, stopping at the first
/// neighbor that is not below the current solution. A negative discriminant
/// falls back to the 1D update from the smallest neighbor.
///
/// Returns infinity if there are no samples or the slowness is infinite.
pub fn solve_upwind(samples: &mut [AxisSample], slowness_sq: f64) -> f64 {
    if samples.is_empty() || !slowness_sq.is_finite() {
        return f64::INFINITY;
    }
    samples.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut aa = 0.0;
    let mut bb = 0.0;
    let mut cc = -slowness_sq;
    let mut solution = f64::INFINITY;

    for sample in samples.iter() {
        if solution < sample.value {
            break;
        }
        aa += sample.inv_h_sq;
        bb += sample.value * sample.inv_h_sq;
        cc += sample.value * sample.value * sample.inv_h_sq;

        match quadratic_root(aa, bb, cc) {
            Some(root) => solution = root,
            None => {
                let first = samples[0];
                return first.value + (slowness_sq / first.inv_h_sq).sqrt();
            }
        }
    }
    solution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(value: f64) -> AxisSample {
        AxisSample::new(value, 1.0)
    }

    #[test]
    fn one_axis_adds_spacing_over_speed() {
        let mut samples = [unit(3.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - 4.0).abs() < 1e-12);

        // Speed 2, spacing 0.5: 3 + 0.5 / 2
        let mut samples = [AxisSample::new(3.0, 0.5)];
        let u = solve_upwind(&mut samples, effective_slowness_sq(2.0, 1.0));
        assert!((u - 3.25).abs() < 1e-12);
    }

    #[test]
    fn two_axes_at_zero() {
        let mut samples = [unit(0.0), unit(0.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn three_axes_at_zero() {
        let mut samples = [unit(0.0), unit(0.0), unit(0.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - 1.0 / 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn distant_neighbor_is_excluded() {
        // The 1D solution from 0 is 1, which is below 100: the second axis
        // never enters the quadratic.
        let mut samples = [unit(100.0), unit(0.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - 1.0).abs() < 1e-12);
        assert_eq!(samples[0].value, 0.0);
    }

    #[test]
    fn partial_inclusion_in_3d() {
        // Third neighbor sits above the 2D solution.
        let mut samples = [unit(0.0), unit(0.0), unit(50.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn anisotropic_spacing() {
        // Both neighbors at zero, spacings 1 and 2:
        // t^2 (1 + 1/4) = 1
        let mut samples = [AxisSample::new(0.0, 1.0), AxisSample::new(0.0, 2.0)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!((u - (1.0f64 / 1.25).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn solution_is_not_below_included_neighbors() {
        let mut samples = [unit(0.3), unit(0.9)];
        let u = solve_upwind(&mut samples, 1.0);
        assert!(u >= 0.9);
        // Residual of the discretized equation.
        let residual = (u - 0.3).powi(2) + (u - 0.9).powi(2) - 1.0;
        assert!(residual.abs() < 1e-12);
    }

    #[test]
    fn no_samples_or_infinite_slowness() {
        assert!(solve_upwind(&mut [], 1.0).is_infinite());
        let mut samples = [unit(0.0)];
        assert!(solve_upwind(&mut samples, f64::INFINITY).is_infinite());
    }

    #[test]
    fn effective_slowness() {
        assert_eq!(effective_slowness_sq(1.0, 1.0), 1.0);
        assert_eq!(effective_slowness_sq(4.0, 2.0), 0.25);
        assert!(effective_slowness_sq(0.0, 1.0).is_infinite());
        assert!(effective_slowness_sq(-1.0, 1.0).is_infinite());
        assert!(effective_slowness_sq(f64::NAN, 1.0).is_infinite());
    }

    #[test]
    fn tiny_positive_speed_stays_finite() {
        let s = effective_slowness_sq(1e-200, 1.0);
        assert!(s.is_finite() && s > 0.0);
        assert_eq!(s, effective_slowness_sq(MIN_SPEED, 1.0));
        // Normalization can push a representable speed below the floor too.
        assert!(effective_slowness_sq(1e-10, 1e300).is_finite());

        let mut samples = [unit(0.0), unit(0.0), unit(0.0)];
        let u = solve_upwind(&mut samples, s);
        assert!(u.is_finite() && u > 1e99);

        // Downstream of such a cell the values stay finite as well.
        let mut samples = [unit(u), unit(u)];
        assert!(solve_upwind(&mut samples, 1.0).is_finite());
    }

    #[test]
    fn quadratic_root_rejects_negative_discriminant() {
        assert_eq!(quadratic_root(2.0, 0.0, 1.0), None);
        assert_eq!(quadratic_root(0.0, 1.0, 1.0), None);
        let root = quadratic_root(1.0, 1.0, 0.0).unwrap();
        assert!((root - 2.0).abs() < 1e-12);
    }

    #[test]
    fn no_nan_produced() {
        let cases: [(&[f64], f64); 5] = [
            (&[0.0, 0.0], 1.0),
            (&[1.0, 1.0, 1.0], 1.0),
            (&[0.0, 0.0], 1e-6),
            (&[0.0, 1e6], 1e6),
            (&[0.0, 0.0, 0.0], 1e12),
        ];
        for (values, slowness_sq) in cases {
            let mut samples: Vec<AxisSample> = values.iter().map(|&v| unit(v)).collect();
            let u = solve_upwind(&mut samples, slowness_sq);
            assert!(
                !u.is_nan(),
                "NaN for solve_upwind({:?}, {})",
                values,
                slowness_sq
            );
        }
    }
}
