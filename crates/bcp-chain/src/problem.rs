//! Entry points: a configured problem on a built grid, and one-shot solves.

use bcp_core::{Real, Result, Time};
use tracing::{debug, instrument};

use crate::backward::{propagate_backward, BackwardSolution};
use crate::config::SolverConfig;
use crate::forward::{propagate_forward, ForwardSolution};
use crate::grid::SpaceTimeGrid;
use crate::operator::{OperatorChain, TransitionBuilder};

/// A validated configuration together with the lattice built from its
/// boundaries.
///
/// Building the grid once lets the forward and backward passes (and any
/// precomputed [`OperatorChain`]) share it.
#[derive(Debug, Clone)]
pub struct BoundaryCrossingProblem {
    config: SolverConfig,
    grid: SpaceTimeGrid,
}

impl BoundaryCrossingProblem {
    /// Sample `g_minus` and `g_plus` on the time grid and lay out the nodes.
    ///
    /// # Errors
    /// [`Error::Boundary`](bcp_core::Error::Boundary) for an empty or
    /// ill-formed corridor.
    #[instrument(level = "debug", skip_all, fields(steps = config.steps(), one_sided = config.one_sided()))]
    pub fn new<L, U>(config: SolverConfig, g_minus: L, g_plus: U) -> Result<Self>
    where
        L: Fn(Time) -> Real,
        U: Fn(Time) -> Real,
    {
        let grid = SpaceTimeGrid::build(&config, g_minus, g_plus)?;
        Ok(Self { config, grid })
    }

    /// The configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The lattice.
    pub fn grid(&self) -> &SpaceTimeGrid {
        &self.grid
    }

    /// On-demand operator source over this grid.
    pub fn transitions(&self) -> TransitionBuilder<'_> {
        TransitionBuilder::new(&self.config, &self.grid)
    }

    /// Compute every step operator once.
    pub fn precompute(&self) -> Result<OperatorChain<'_>> {
        OperatorChain::build(&self.transitions())
    }

    /// Forward pass, building each step operator as it is needed.
    pub fn forward(&self, retain_history: bool) -> Result<ForwardSolution> {
        propagate_forward(&self.transitions(), self.config.target(), retain_history)
    }

    /// Backward pass with the payoff `1_{[a,b]}` (or `1` without a target).
    pub fn backward(&self, retain_history: bool) -> Result<BackwardSolution> {
        let target = self.config.target();
        propagate_backward(&self.transitions(), |y| target.indicator(y), retain_history)
    }

    /// Backward pass with an arbitrary bounded terminal payoff `ψ`.
    pub fn backward_with_payoff<P>(&self, payoff: P, retain_history: bool) -> Result<BackwardSolution>
    where
        P: Fn(Real) -> Real,
    {
        propagate_backward(&self.transitions(), payoff, retain_history)
    }
}

/// Forward solve in one call.
///
/// ```
/// use bcp_chain::{forward_solve, BridgeMode, Potential, SolverConfig, TargetSet, TransitionScheme};
/// use bcp_math::IntegrationScheme;
///
/// let config = SolverConfig::builder()
///     .with_x0(0.0)
///     .with_horizon(1.0)
///     .with_drift(|_, _| 0.0)
///     .with_diffusion(|_, _| 1.0)
///     .with_potential(Potential::zero())
///     .with_target(TargetSet::Everywhere)
///     .with_bridge_mode(BridgeMode::PiecewiseLinear)
///     .one_sided(true)
///     .with_steps(20)
///     .with_delta(0.25)
///     .with_terminal_power(1.0)
///     .with_gamma(1.0)
///     .with_integration_scheme(IntegrationScheme::Trapezoidal)
///     .with_transition_scheme(TransitionScheme::Gaussian)
///     .build()?;
/// let solution = forward_solve(&config, |_| -5.0, |_| 1.0, false)?;
/// // P(max_{t≤1} W_t < 1) = 2Φ(1) − 1 ≈ 0.6827
/// assert!((solution.non_crossing_probability().re - 0.6827).abs() < 1e-2);
/// # Ok::<(), bcp_core::Error>(())
/// ```
#[instrument(level = "debug", skip_all, fields(steps = config.steps()))]
pub fn forward_solve<L, U>(
    config: &SolverConfig,
    g_minus: L,
    g_plus: U,
    retain_history: bool,
) -> Result<ForwardSolution>
where
    L: Fn(Time) -> Real,
    U: Fn(Time) -> Real,
{
    let problem = BoundaryCrossingProblem::new(config.clone(), g_minus, g_plus)?;
    let solution = problem.forward(retain_history)?;
    debug!(probability = %solution.non_crossing_probability(), "forward solve");
    Ok(solution)
}

/// Backward solve in one call, with the target-indicator payoff.
#[instrument(level = "debug", skip_all, fields(steps = config.steps()))]
pub fn backward_solve<L, U>(
    config: &SolverConfig,
    g_minus: L,
    g_plus: U,
    retain_history: bool,
) -> Result<BackwardSolution>
where
    L: Fn(Time) -> Real,
    U: Fn(Time) -> Real,
{
    let problem = BoundaryCrossingProblem::new(config.clone(), g_minus, g_plus)?;
    let solution = problem.backward(retain_history)?;
    debug!(value = %solution.value_at_start(), "backward solve");
    Ok(solution)
}

/// Backward solve in one call with an arbitrary terminal payoff.
#[instrument(level = "debug", skip_all, fields(steps = config.steps()))]
pub fn backward_solve_with_payoff<L, U, P>(
    config: &SolverConfig,
    g_minus: L,
    g_plus: U,
    payoff: P,
    retain_history: bool,
) -> Result<BackwardSolution>
where
    L: Fn(Time) -> Real,
    U: Fn(Time) -> Real,
    P: Fn(Real) -> Real,
{
    let problem = BoundaryCrossingProblem::new(config.clone(), g_minus, g_plus)?;
    problem.backward_with_payoff(payoff, retain_history)
}
