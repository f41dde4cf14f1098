//! One-step transition probabilities on the lattice.
//!
//! For a node `x` at `t_k` the increment over `Δt` has conditional mean
//! `m = x + μ(t_k, x)·Δt` and variance `v = σ²(t_k, x)·Δt`. The schemes
//! here spread unit mass over lattice points of level `k + 1` so that the
//! first two moments are `m` and `v`. Points outside the level's corridor
//! are still returned; the operator builder drops them as absorbed mass.

use bcp_core::Real;

use crate::config::TransitionScheme;
use crate::grid::SpaceLevel;

/// Half-width, in standard deviations, of the Gaussian kernel window.
pub const KERNEL_WIDTH: Real = 6.0;

/// Probabilities from one node before bridge and potential weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// `(lattice index on the next level, probability)`; probabilities are
    /// non-negative and sum to one.
    pub targets: Vec<(i64, Real)>,
    /// Total magnitude of negative probabilities removed before
    /// renormalisation.
    pub clipped: Real,
}

/// Lay out the transition from a node with conditional `mean` and
/// `variance` onto `next`.
pub fn raw_row(scheme: TransitionScheme, next: &SpaceLevel, mean: Real, variance: Real) -> RawRow {
    match scheme {
        TransitionScheme::Trinomial => trinomial(next, mean, variance),
        TransitionScheme::Gaussian => gaussian(next, mean, variance),
    }
}

/// Up / stay / down around the lattice point `c` nearest the mean, with a
/// jump of `s` lattice spacings, `s = max(1, round(√(3v)/h))`.
///
/// With `d = s·h`, `e = m − y_c` and `q = (v + e²)/d²`:
/// `p_up = (q + e/d)/2`, `p_down = (q − e/d)/2`, `p_stay = 1 − q`.
///
/// All three are non-negative for every `|e| ≤ h/2` when
/// `√(v + h²/4) ≤ d ≤ 2v/h`; `s` is clamped into that band whenever it
/// contains an integer.
fn trinomial(next: &SpaceLevel, mean: Real, variance: Real) -> RawRow {
    let h = next.step();
    let c = next.nearest_lattice_index(mean);
    let ratio = variance / (h * h);
    let preferred = (3.0 * ratio).sqrt().round().max(1.0);
    let (min_stride, max_stride) = ((ratio + 0.25).sqrt().ceil().max(1.0), (2.0 * ratio).floor());
    let stride = (if min_stride <= max_stride {
        preferred.clamp(min_stride, max_stride)
    } else {
        preferred
    }) as i64;
    let d = stride as Real * h;
    let e = mean - next.lattice_point(c);
    let q = (variance + e * e) / (d * d);

    let mut targets = vec![
        (c - stride, 0.5 * (q - e / d)),
        (c, 1.0 - q),
        (c + stride, 0.5 * (q + e / d)),
    ];
    let clipped = clip_and_renormalise(&mut targets);
    RawRow { targets, clipped }
}

/// Gaussian kernel over every lattice point within [`KERNEL_WIDTH`]
/// standard deviations of the mean, tilted by `1 + αz + β(z² − v̂)` so that
/// the discrete mean and variance match `m` and `v` exactly.
///
/// Falls back to [`trinomial`] when the window holds fewer than three
/// lattice points.
fn gaussian(next: &SpaceLevel, mean: Real, variance: Real) -> RawRow {
    let h = next.step();
    let sd = variance.sqrt();
    let lo = ((mean - KERNEL_WIDTH * sd - next.lattice_point(0)) / h).ceil() as i64;
    let hi = ((mean + KERNEL_WIDTH * sd - next.lattice_point(0)) / h).floor() as i64;
    if hi - lo < 2 {
        return trinomial(next, mean, variance);
    }

    let mut targets: Vec<(i64, Real)> = (lo..=hi)
        .map(|j| {
            let z = next.lattice_point(j) - mean;
            (j, (-0.5 * z * z / variance).exp())
        })
        .collect();
    let total: Real = targets.iter().map(|&(_, w)| w).sum();
    targets.iter_mut().for_each(|(_, w)| *w /= total);

    moment_correct(next, &mut targets, mean, variance);
    let clipped = clip_and_renormalise(&mut targets);
    RawRow { targets, clipped }
}

/// Quadratic tilt matching mean and variance.
///
/// With discrete moments `m̂`, `v̂` and central moments `s₃`, `s₄` of the
/// kernel, the tilt coefficients solve
/// `α v̂ + β s₃ = m − m̂` and `α s₃ + β (s₄ − v̂²) = v + (m − m̂)² − v̂`.
fn moment_correct(next: &SpaceLevel, targets: &mut [(i64, Real)], mean: Real, variance: Real) {
    let m_hat: Real = targets.iter().map(|&(j, w)| w * next.lattice_point(j)).sum();
    let (mut v_hat, mut s3, mut s4) = (0.0, 0.0, 0.0);
    for &(j, w) in targets.iter() {
        let z = next.lattice_point(j) - m_hat;
        let z2 = z * z;
        v_hat += w * z2;
        s3 += w * z2 * z;
        s4 += w * z2 * z2;
    }

    let dm = mean - m_hat;
    let k4 = s4 - v_hat * v_hat;
    let det = v_hat * k4 - s3 * s3;
    if !(det.abs() > Real::EPSILON * v_hat * v_hat * v_hat) {
        return;
    }
    let rhs = variance + dm * dm - v_hat;
    let alpha = (dm * k4 - s3 * rhs) / det;
    let beta = (v_hat * rhs - s3 * dm) / det;

    for (j, w) in targets.iter_mut() {
        let z = next.lattice_point(*j) - m_hat;
        *w *= 1.0 + alpha * z + beta * (z * z - v_hat);
    }
}

/// Zero out negative probabilities, rescale the rest to sum to one, and
/// return the removed magnitude.
fn clip_and_renormalise(targets: &mut Vec<(i64, Real)>) -> Real {
    let mut clipped = 0.0;
    for (_, p) in targets.iter_mut() {
        if *p < 0.0 {
            clipped -= *p;
            *p = 0.0;
        }
    }
    targets.retain(|&(_, p)| p > 0.0);
    let total: Real = targets.iter().map(|&(_, p)| p).sum();
    if total > 0.0 {
        targets.iter_mut().for_each(|(_, p)| *p /= total);
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeMode, Potential, SolverConfig, TargetSet};
    use crate::grid::SpaceTimeGrid;
    use bcp_core::Size;
    use approx::assert_abs_diff_eq;
    use bcp_math::IntegrationScheme;
    use proptest::prelude::*;

    /// First two moments of a raw row, `(mean, variance)`.
    fn moments(next: &SpaceLevel, row: &RawRow) -> (Real, Real) {
        let mean: Real = row
            .targets
            .iter()
            .map(|&(j, p)| p * next.lattice_point(j))
            .sum();
        let variance = row
            .targets
            .iter()
            .map(|&(j, p)| {
                let z = next.lattice_point(j) - mean;
                p * z * z
            })
            .sum();
        (mean, variance)
    }

    /// Number of lattice points a row touches.
    fn width(row: &RawRow) -> Size {
        row.targets.len()
    }

    fn level(n: Size, delta: Real) -> SpaceLevel {
        let cfg = SolverConfig::builder()
            .with_x0(0.0)
            .with_horizon(1.0)
            .with_drift(|_, _| 0.0)
            .with_diffusion(|_, _| 1.0)
            .with_potential(Potential::zero())
            .with_target(TargetSet::Everywhere)
            .with_bridge_mode(BridgeMode::PiecewiseLinear)
            .one_sided(false)
            .with_steps(n)
            .with_delta(delta)
            .with_terminal_power(0.5 + delta)
            .with_gamma(1.0)
            .with_integration_scheme(IntegrationScheme::Trapezoidal)
            .with_transition_scheme(TransitionScheme::Gaussian)
            .build()
            .unwrap();
        let grid = SpaceTimeGrid::build(&cfg, |_| -10.0, |_| 10.0).unwrap();
        grid.level(1).clone()
    }

    #[test]
    fn trinomial_matches_moments() {
        let next = level(25, 0.0);
        let v = 1.0 / 25.0;
        let m = 0.013;
        let row = raw_row(TransitionScheme::Trinomial, &next, m, v);
        assert_eq!(width(&row), 3);
        assert_eq!(row.clipped, 0.0);
        let (mean, var) = moments(&next, &row);
        assert_abs_diff_eq!(mean, m, epsilon = 1e-14);
        assert_abs_diff_eq!(var, v, epsilon = 1e-14);
    }

    #[test]
    fn trinomial_stride_follows_variance() {
        // h = Δt^{3/4} is much finer than √(3Δt): the jump spans several
        // lattice spacings.
        let next = level(64, 0.25);
        let v = 1.0 / 64.0;
        let row = raw_row(TransitionScheme::Trinomial, &next, 0.0, v);
        let span = row.targets[2].0 - row.targets[0].0;
        assert_eq!(span, 2 * ((3.0 * v).sqrt() / next.step()).round() as i64);
    }

    #[test]
    fn gaussian_matches_moments() {
        let next = level(64, 0.25);
        let v = 1.0 / 64.0;
        let m = 0.0371;
        let row = raw_row(TransitionScheme::Gaussian, &next, m, v);
        assert!(width(&row) > 3);
        assert_eq!(row.clipped, 0.0);
        let total: Real = row.targets.iter().map(|&(_, p)| p).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-13);
        let (mean, var) = moments(&next, &row);
        assert_abs_diff_eq!(mean, m, epsilon = 1e-13);
        assert_abs_diff_eq!(var, v, epsilon = 1e-13);
    }

    #[test]
    fn gaussian_on_coarse_lattice_degrades_to_trinomial() {
        let next = level(4, 0.0);
        let v = 1e-4;
        let g = raw_row(TransitionScheme::Gaussian, &next, 0.1, v);
        let t = raw_row(TransitionScheme::Trinomial, &next, 0.1, v);
        assert_eq!(g, t);
    }

    #[test]
    fn infeasible_offset_is_clipped() {
        // Mean halfway between lattice points with a tiny variance: no
        // three-point law reproduces both moments.
        let next = level(4, 0.0);
        let h = next.step();
        let row = raw_row(TransitionScheme::Trinomial, &next, 0.5 * h, 1e-6);
        assert!(row.clipped > 0.1);
        let total: Real = row.targets.iter().map(|&(_, p)| p).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-14);
    }

    proptest! {
        #[test]
        fn rows_are_probability_vectors(m in -0.5..0.5f64, v in 0.005..0.05f64) {
            let next = level(32, 0.25);
            for scheme in [TransitionScheme::Trinomial, TransitionScheme::Gaussian] {
                let row = raw_row(scheme, &next, m, v);
                let total: Real = row.targets.iter().map(|&(_, p)| p).sum();
                prop_assert!((total - 1.0).abs() < 1e-12);
                prop_assert!(row.targets.iter().all(|&(_, p)| (0.0..=1.0).contains(&p)));
            }
        }
    }
}
