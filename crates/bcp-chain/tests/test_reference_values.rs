//! Non-crossing probabilities against closed-form references.

use approx::assert_abs_diff_eq;
use bcp_chain::{
    backward_solve, forward_solve, BridgeMode, Potential, SolverConfig, SolverConfigBuilder,
    TargetSet, TransitionScheme,
};
use bcp_core::{Amplitude, Real};
use bcp_math::IntegrationScheme;
use statrs::distribution::{ContinuousCDF, Normal};

fn std_normal_cdf(x: Real) -> Real {
    Normal::new(0.0, 1.0).unwrap().cdf(x)
}

fn brownian(n: usize, one_sided: bool) -> SolverConfigBuilder {
    SolverConfig::builder()
        .with_x0(0.0)
        .with_horizon(1.0)
        .with_drift(|_, _| 0.0)
        .with_diffusion(|_, _| 1.0)
        .with_potential(Potential::zero())
        .with_target(TargetSet::Everywhere)
        .with_bridge_mode(BridgeMode::PiecewiseLinear)
        .one_sided(one_sided)
        .with_steps(n)
        .with_delta(0.25)
        .with_terminal_power(1.0)
        .with_gamma(1.0)
        .with_integration_scheme(IntegrationScheme::Trapezoidal)
}

// ─── Daniels boundary ─────────────────────────────────────────────────────────

/// Daniels (1969) boundary, for which the crossing probability of standard
/// Brownian motion is known in closed form.
fn daniels(t: Real) -> Real {
    if t <= 0.0 {
        return 0.5;
    }
    0.5 - t * (0.25 * (1.0 + (1.0 + 8.0 * (-1.0 / t).exp()).sqrt())).ln()
}

/// `P(W_t < g(t) for all t ≤ 1)` for the Daniels boundary, from the image
/// density `φ₁(x) − ½φ₁(x − 1) − ½φ₁(x − 2)`.
fn daniels_non_crossing() -> Real {
    let g = daniels(1.0);
    std_normal_cdf(g) - 0.5 * std_normal_cdf(g - 1.0) - 0.5 * std_normal_cdf(g - 2.0)
}

#[test]
fn test_daniels_closed_form() {
    assert_abs_diff_eq!(1.0 - daniels_non_crossing(), 0.4798, epsilon = 1e-3);
}

#[test]
fn test_daniels_trinomial() {
    let config = brownian(40, true)
        .with_delta(0.0)
        .with_terminal_power(0.5)
        .with_transition_scheme(TransitionScheme::Trinomial)
        .build()
        .unwrap();
    let solution = forward_solve(&config, |_| -3.75, daniels, false).unwrap();
    let p = solution.non_crossing_probability();
    assert_abs_diff_eq!(p.re, daniels_non_crossing(), epsilon = 1e-2);
    assert_abs_diff_eq!(solution.crossing_probability().re, 0.4798, epsilon = 1e-2);
    assert_abs_diff_eq!(p.im, 0.0, epsilon = 1e-12);
}

#[test]
fn test_daniels_gaussian() {
    for delta in [0.25, 0.5] {
        let config = brownian(40, true)
            .with_delta(delta)
            .with_transition_scheme(TransitionScheme::Gaussian)
            .build()
            .unwrap();
        let fwd = forward_solve(&config, |_| -3.75, daniels, false).unwrap();
        let bwd = backward_solve(&config, |_| -3.75, daniels, false).unwrap();
        assert_abs_diff_eq!(fwd.non_crossing_probability().re, daniels_non_crossing(), epsilon = 1e-3);
        assert_abs_diff_eq!(fwd.crossing_probability().re, 0.4798, epsilon = 1e-2);
        assert_abs_diff_eq!(
            bwd.non_crossing_probability().re,
            fwd.non_crossing_probability().re,
            epsilon = 1e-12
        );
    }
}

// ─── Straight boundaries ──────────────────────────────────────────────────────

#[test]
fn test_single_barrier_reflection_principle() {
    // P(max_{t≤1} W_t < 1) = 2Φ(1) − 1.
    let config = brownian(40, true)
        .with_transition_scheme(TransitionScheme::Gaussian)
        .build()
        .unwrap();
    let solution = forward_solve(&config, |_| -4.0, |_| 1.0, false).unwrap();
    assert_abs_diff_eq!(
        solution.non_crossing_probability().re,
        2.0 * std_normal_cdf(1.0) - 1.0,
        epsilon = 2e-3
    );
}

#[test]
fn test_symmetric_corridor_image_series() {
    // P(|W_t| < 1 for all t ≤ 1) = Σ_k (−1)^k [Φ(2k + 1) − Φ(2k − 1)].
    let exact: Real = (-20..=20)
        .map(|k: i32| {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            let k = k as Real;
            sign * (std_normal_cdf(2.0 * k + 1.0) - std_normal_cdf(2.0 * k - 1.0))
        })
        .sum();
    assert_abs_diff_eq!(exact, 0.37078, epsilon = 1e-5);

    let config = brownian(20, false)
        .with_transition_scheme(TransitionScheme::Gaussian)
        .build()
        .unwrap();
    let solution = forward_solve(&config, |_| -1.0, |_| 1.0, false).unwrap();
    assert_abs_diff_eq!(solution.non_crossing_probability().re, exact, epsilon = 3e-3);
}

// ─── Complex potential ────────────────────────────────────────────────────────

#[test]
fn test_imaginary_quadratic_potential() {
    let config = brownian(40, false)
        .with_potential(Potential::complex(|_, x| Amplitude::new(0.0, x * x)))
        .with_transition_scheme(TransitionScheme::Gaussian)
        .build()
        .unwrap();
    let lower = |t: Real| -(4.0 - t * t);
    let upper = |t: Real| 4.0 - t * t;
    let value = backward_solve(&config, lower, upper, false)
        .unwrap()
        .non_crossing_probability();
    assert!(value.im.abs() > 1e-3, "imaginary part vanished: {value}");
    assert!(value.norm() <= 1.0);

    // Free Brownian motion gives E[exp(−i∫W²dt)] = cosh(√(2i))^{-1/2}; the
    // wide corridor barely changes it and the left-point discount is first
    // order in Δt.
    let free = Amplitude::new(0.0, 2.0).sqrt().cosh().sqrt().inv();
    assert_abs_diff_eq!(value.re, free.re, epsilon = 2e-2);
    assert_abs_diff_eq!(value.im, free.im, epsilon = 2e-2);
}
