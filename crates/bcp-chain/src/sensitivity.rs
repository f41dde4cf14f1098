//! Boundary sensitivities built from the forward and backward solutions.
//!
//! Both quantities need the slope of the taboo density `f` at a boundary
//! and, for the Gateaux derivative, the slope of the value function `v`:
//!
//! * first-passage density through `g`: `f_τ(t) = ∓½σ²(t, g(t))·∂ₓf(t, g(t))`;
//! * Gateaux derivative of the non-crossing probability in the direction
//!   `h(t)` of a perturbation of `g`:
//!   `±½ ∫₀ᵀ h(t)·σ²(t, g(t))·∂ₓf(t, g(t))·∂ₓv(t, g(t)) dt`,
//!   upper sign for `g₊`.
//!
//! Near `T` the value-function slope grows like `(T − t)^{-1/2}`, so the
//! last panel `[t_{n−1}, T]` is integrated with
//! [`sqrt_singular_end_panel`] instead of the regular rule.

use bcp_core::{ensure_config, Amplitude, Error, Real, Result, Time};
use bcp_math::{integrate, sqrt_singular_end_panel};
use tracing::{debug, instrument};

use crate::backward::BackwardSolution;
use crate::forward::ForwardSolution;
use crate::grid::BoundarySide;
use crate::problem::BoundaryCrossingProblem;

fn ensure_same_times(problem: &BoundaryCrossingProblem, times: &[Time], what: &str) -> Result<()> {
    let n = problem.grid().steps();
    ensure_config!(
        times.len() == n + 1 && times.iter().zip(problem.grid().levels()).all(|(&t, l)| t == l.time()),
        "{what} solution was not computed on this grid ({} levels, grid has {})",
        times.len(),
        n + 1
    );
    Ok(())
}

fn side_sign(side: BoundarySide) -> Real {
    match side {
        BoundarySide::Upper => 1.0,
        BoundarySide::Lower => -1.0,
    }
}

/// Slopes `∂ₓf(t_k, g(t_k))` of the forward taboo density, `k = 0..=n`.
///
/// # Errors
/// [`Error::MissingHistory`] when the forward solution kept only the
/// terminal level; [`Error::Configuration`] when it belongs to another grid.
pub fn taboo_density_slopes(
    problem: &BoundaryCrossingProblem,
    forward: &ForwardSolution,
    side: BoundarySide,
) -> Result<Vec<Amplitude>> {
    if !forward.has_history() {
        return Err(Error::MissingHistory(
            "boundary slopes of the taboo density need every forward level".into(),
        ));
    }
    ensure_same_times(problem, forward.times(), "forward")?;
    problem
        .grid()
        .levels()
        .iter()
        .enumerate()
        .map(|(k, level)| {
            let density = forward.taboo_density(k)?;
            ensure_config!(
                density.len() == level.len(),
                "forward level {k} has {} nodes, grid level has {}",
                density.len(),
                level.len()
            );
            Ok(level.boundary_slope(&density, side))
        })
        .collect()
}

/// Density of the first-passage time through the boundary on `side`,
/// sampled at every grid time.
///
/// The terminal sample reflects the target restriction, if any.
#[instrument(level = "debug", skip_all, fields(side = ?side))]
pub fn first_passage_density(
    problem: &BoundaryCrossingProblem,
    forward: &ForwardSolution,
    side: BoundarySide,
) -> Result<Vec<(Time, Amplitude)>> {
    let slopes = taboo_density_slopes(problem, forward, side)?;
    let config = problem.config();
    let density: Vec<(Time, Amplitude)> = problem
        .grid()
        .levels()
        .iter()
        .zip(slopes)
        .map(|(level, slope)| {
            let t = level.time();
            let sigma = config.diffusion(t, level.boundary(side));
            (t, slope * (-0.5 * side_sign(side) * sigma * sigma))
        })
        .collect();
    Ok(density)
}

/// Gateaux derivative of the non-crossing probability with respect to the
/// boundary on `side`, in the direction `direction(t)`.
///
/// The backward solution must come from the same grid and use the payoff
/// whose expectation is being differentiated (the unit payoff for the
/// plain non-crossing probability).
///
/// # Errors
/// As [`taboo_density_slopes`]; [`Error::Configuration`] also when the
/// backward solution belongs to another grid.
#[instrument(level = "debug", skip_all, fields(side = ?side))]
pub fn gateaux_derivative<H>(
    problem: &BoundaryCrossingProblem,
    forward: &ForwardSolution,
    backward: &BackwardSolution,
    side: BoundarySide,
    direction: H,
) -> Result<Amplitude>
where
    H: Fn(Time) -> Real,
{
    ensure_same_times(problem, backward.times(), "backward")?;
    let f_slopes = taboo_density_slopes(problem, forward, side)?;
    let v_slopes = backward.boundary_derivative(side);
    let config = problem.config();
    let n = problem.grid().steps();

    let integrand: Vec<(Time, Amplitude)> = problem.grid().levels()[..n]
        .iter()
        .enumerate()
        .map(|(k, level)| {
            let t = level.time();
            let sigma = config.diffusion(t, level.boundary(side));
            let weight = 0.5 * side_sign(side) * direction(t) * sigma * sigma;
            (t, f_slopes[k] * v_slopes[k] * weight)
        })
        .collect();

    let body = integrate(config.integration_scheme(), &integrand);
    let (t_last, last) = integrand[n - 1];
    let tail = sqrt_singular_end_panel(t_last, last, config.horizon());
    let derivative = body + tail;
    debug!(%derivative, "gateaux derivative");
    Ok(derivative)
}
