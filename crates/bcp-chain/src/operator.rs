//! Weighted one-step transition operators.
//!
//! A [`StepOperator`] maps level `k` to level `k + 1`: row `i` lists the
//! destinations of node `i` with weight
//! `raw probability × bridge factor × exp(−V·Δt)`. Destinations outside the
//! next level's corridor do not appear, so a row sums to less than one by
//! the absorbed (and killed) mass.
//!
//! Operators come from an [`OperatorSource`]: either a [`TransitionBuilder`]
//! that assembles each step on demand, or an [`OperatorChain`] holding all
//! `n` steps so that the forward and backward passes share them.

use std::borrow::Cow;

use bcp_core::{Amplitude, Error, Real, Result, Size};
use num_traits::Zero;
use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use crate::bridge::BridgeCorrector;
use crate::config::SolverConfig;
use crate::grid::{SpaceLevel, SpaceTimeGrid, MAX_LEVEL_NODES};
use crate::potential;
use crate::transition::{self, KERNEL_WIDTH};

/// Sparse row: `(destination node index, weight)`.
pub type Row = Vec<(Size, Amplitude)>;

// ─── StepOperator ─────────────────────────────────────────────────────────────

/// Transition operator from level `step` to level `step + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOperator {
    step: Size,
    rows: Vec<Row>,
    target_len: Size,
}

impl StepOperator {
    /// Wrap pre-assembled rows; destinations must be `< target_len`.
    pub fn new(step: Size, rows: Vec<Row>, target_len: Size) -> Self {
        debug_assert!(rows.iter().flatten().all(|&(j, _)| j < target_len));
        Self { step, rows, target_len }
    }

    /// Originating time index `k`.
    pub fn step(&self) -> Size {
        self.step
    }

    /// Number of source nodes `m_k`.
    pub fn source_len(&self) -> Size {
        self.rows.len()
    }

    /// Number of destination nodes `m_{k+1}`.
    pub fn target_len(&self) -> Size {
        self.target_len
    }

    /// All rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row of node `i`.
    pub fn row(&self, i: Size) -> &[(Size, Amplitude)] {
        &self.rows[i]
    }

    /// Total weight leaving node `i`.
    pub fn row_sum(&self, i: Size) -> Amplitude {
        self.rows[i].iter().map(|&(_, w)| w).sum()
    }

    /// Number of stored weights.
    pub fn nnz(&self) -> Size {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Forward scatter: `u'[j] = Σ_i u[i]·w(i, j)`.
    pub fn apply_forward(&self, mass: &[Amplitude]) -> Vec<Amplitude> {
        let mut next = vec![Amplitude::zero(); self.target_len];
        for (row, &u) in self.rows.iter().zip(mass) {
            if u.is_zero() {
                continue;
            }
            for &(j, w) in row {
                next[j] += u * w;
            }
        }
        next
    }

    /// Backward gather: `v[i] = Σ_j w(i, j)·v'[j]`, parallel over `i`.
    pub fn apply_adjoint(&self, values: &[Amplitude]) -> Vec<Amplitude> {
        self.rows
            .par_iter()
            .map(|row| row.iter().map(|&(j, w)| w * values[j]).sum::<Amplitude>())
            .collect()
    }
}

// ─── OperatorSource ───────────────────────────────────────────────────────────

/// Supplies the step operators of one grid, in any order.
pub trait OperatorSource {
    /// The grid the operators act on.
    fn grid(&self) -> &SpaceTimeGrid;

    /// Operator from level `k` to `k + 1`, `k < n`.
    fn operator(&self, k: Size) -> Result<Cow<'_, StepOperator>>;
}

// ─── TransitionBuilder ────────────────────────────────────────────────────────

/// Assembles step operators from the configuration and grid.
#[derive(Debug, Clone, Copy)]
pub struct TransitionBuilder<'a> {
    config: &'a SolverConfig,
    grid: &'a SpaceTimeGrid,
    corrector: BridgeCorrector,
}

impl<'a> TransitionBuilder<'a> {
    /// Builder for `grid`, which must have been built from `config`.
    pub fn new(config: &'a SolverConfig, grid: &'a SpaceTimeGrid) -> Self {
        let corrector = BridgeCorrector::new(config.bridge_mode(), config.one_sided());
        Self { config, grid, corrector }
    }

    /// Assemble the operator of step `k`; rows are built in parallel.
    ///
    /// # Errors
    /// [`Error::NumericalInstability`] when a node's coefficients are not
    /// usable, one step would jump further than a level can hold, or too
    /// much probability had to be clipped;
    /// [`Error::NumericalOverflow`] for non-finite weights.
    pub fn build_step(&self, k: Size) -> Result<StepOperator> {
        let here = self.grid.level(k);
        let next = self.grid.level(k + 1);
        let rows = (0..here.len())
            .into_par_iter()
            .map(|i| self.build_row(k, i, here, next))
            .collect::<Result<Vec<Row>>>()?;
        let op = StepOperator::new(k, rows, next.len());
        trace!(step = k, rows = op.source_len(), nnz = op.nnz(), "step operator assembled");
        Ok(op)
    }

    fn build_row(&self, k: Size, i: Size, here: &SpaceLevel, next: &SpaceLevel) -> Result<Row> {
        let t = here.time();
        let x = here.node(i);
        let dt = self.grid.dt();
        let instability = |detail: String| Error::NumericalInstability { step: k, node: i, x, detail };

        let mu = self.config.drift(t, x);
        let sigma = self.config.diffusion(t, x);
        if !mu.is_finite() {
            return Err(instability(format!("drift is not finite: {mu}")));
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(instability(format!("diffusion must be positive and finite, got {sigma}")));
        }

        let mean = x + mu * dt;
        let variance = sigma * sigma * dt;
        let reach = ((mean - x).abs() + KERNEL_WIDTH * variance.sqrt()) / next.step();
        if !(reach <= MAX_LEVEL_NODES as Real) {
            return Err(instability(format!(
                "one step reaches {reach:.3e} lattice spacings (mu = {mu}, sigma = {sigma}); \
                 refine the lattice"
            )));
        }
        let raw = transition::raw_row(self.config.transition_scheme(), next, mean, variance);
        if raw.clipped > self.config.clip_tolerance() {
            return Err(instability(format!(
                "clipped probability {:.3e} exceeds tolerance {:.3e}; refine the lattice",
                raw.clipped,
                self.config.clip_tolerance()
            )));
        }

        let discount = potential::discount(self.config.potential(), t, x, dt, k, i)?;
        let mut row = Row::with_capacity(raw.targets.len());
        for (j, p) in raw.targets {
            let Some(dest) = next.index_of(j) else { continue };
            let y = next.lattice_point(j);
            let survival = self.corrector.survival(here, x, next, y, variance);
            if !survival.is_finite() {
                return Err(Error::NumericalOverflow {
                    step: k,
                    node: i,
                    detail: format!("bridge factor to y = {y} is not finite"),
                });
            }
            let weight: Real = p * survival;
            if weight > 0.0 {
                row.push((dest, discount * weight));
            }
        }
        Ok(row)
    }
}

impl OperatorSource for TransitionBuilder<'_> {
    fn grid(&self) -> &SpaceTimeGrid {
        self.grid
    }

    fn operator(&self, k: Size) -> Result<Cow<'_, StepOperator>> {
        self.build_step(k).map(Cow::Owned)
    }
}

// ─── OperatorChain ────────────────────────────────────────────────────────────

/// All `n` step operators of a grid, computed once.
#[derive(Debug, Clone)]
pub struct OperatorChain<'a> {
    grid: &'a SpaceTimeGrid,
    operators: Vec<StepOperator>,
}

impl<'a> OperatorChain<'a> {
    /// Assemble every step with `builder`.
    #[instrument(level = "debug", skip_all, fields(steps = builder.grid.steps()))]
    pub fn build(builder: &TransitionBuilder<'a>) -> Result<Self> {
        let operators = (0..builder.grid.steps())
            .map(|k| builder.build_step(k))
            .collect::<Result<Vec<_>>>()?;
        let nnz: Size = operators.iter().map(StepOperator::nnz).sum();
        debug!(nnz, "operator chain precomputed");
        Ok(Self { grid: builder.grid, operators })
    }

    /// The operators, `k = 0..n`.
    pub fn operators(&self) -> &[StepOperator] {
        &self.operators
    }
}

impl OperatorSource for OperatorChain<'_> {
    fn grid(&self) -> &SpaceTimeGrid {
        self.grid
    }

    fn operator(&self, k: Size) -> Result<Cow<'_, StepOperator>> {
        Ok(Cow::Borrowed(&self.operators[k]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeMode, Potential, TargetSet, TransitionScheme};
    use approx::assert_abs_diff_eq;
    use bcp_math::IntegrationScheme;

    fn config(potential: Potential) -> SolverConfig {
        SolverConfig::builder()
            .with_x0(0.0)
            .with_horizon(1.0)
            .with_drift(|_, x| -0.5 * x)
            .with_diffusion(|_, _| 1.0)
            .with_potential(potential)
            .with_target(TargetSet::Everywhere)
            .with_bridge_mode(BridgeMode::PiecewiseLinear)
            .one_sided(false)
            .with_steps(20)
            .with_delta(0.25)
            .with_terminal_power(1.0)
            .with_gamma(1.0)
            .with_integration_scheme(IntegrationScheme::Trapezoidal)
            .with_transition_scheme(TransitionScheme::Gaussian)
            .build()
            .unwrap()
    }

    #[test]
    fn rows_sum_to_at_most_one() {
        let cfg = config(Potential::zero());
        let grid = SpaceTimeGrid::build(&cfg, |_| -1.0, |_| 1.0).unwrap();
        let builder = TransitionBuilder::new(&cfg, &grid);
        for k in 0..grid.steps() {
            let op = builder.build_step(k).unwrap();
            assert_eq!(op.source_len(), grid.level(k).len());
            assert_eq!(op.target_len(), grid.level(k + 1).len());
            for i in 0..op.source_len() {
                let s = op.row_sum(i);
                assert!(s.re <= 1.0 + 1e-12 && s.re >= 0.0);
                assert_eq!(s.im, 0.0);
            }
        }
    }

    #[test]
    fn far_boundaries_conserve_row_mass() {
        let cfg = config(Potential::zero());
        let grid = SpaceTimeGrid::build(&cfg, |_| -40.0, |_| 40.0).unwrap();
        let op = TransitionBuilder::new(&cfg, &grid).build_step(3).unwrap();
        let centre = op.source_len() / 2;
        assert_abs_diff_eq!(op.row_sum(centre).re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn killing_scales_rows() {
        let plain = config(Potential::zero());
        let killed = config(Potential::real(|_, _| 2.0));
        let grid = SpaceTimeGrid::build(&plain, |_| -1.0, |_| 1.0).unwrap();
        let a = TransitionBuilder::new(&plain, &grid).build_step(0).unwrap();
        let b = TransitionBuilder::new(&killed, &grid).build_step(0).unwrap();
        let i = grid.start_index();
        assert_abs_diff_eq!(b.row_sum(i).re, a.row_sum(i).re * (-0.1_f64).exp(), epsilon = 1e-14);
    }

    #[test]
    fn forward_and_adjoint_are_transposes() {
        let cfg = config(Potential::complex(|_, x| Amplitude::new(0.0, x * x)));
        let grid = SpaceTimeGrid::build(&cfg, |_| -1.0, |_| 1.0).unwrap();
        let op = TransitionBuilder::new(&cfg, &grid).build_step(5).unwrap();
        let u: Vec<Amplitude> = (0..op.source_len())
            .map(|i| Amplitude::new(1.0 + i as Real, -0.5 * i as Real))
            .collect();
        let v: Vec<Amplitude> = (0..op.target_len())
            .map(|j| Amplitude::new((j as Real).sin(), 0.25))
            .collect();
        let lhs: Amplitude = op.apply_forward(&u).iter().zip(&v).map(|(a, b)| a * b).sum();
        let rhs: Amplitude = u.iter().zip(op.apply_adjoint(&v)).map(|(a, b)| a * b).sum();
        assert_abs_diff_eq!(lhs.re, rhs.re, epsilon = 1e-10);
        assert_abs_diff_eq!(lhs.im, rhs.im, epsilon = 1e-10);
    }

    #[test]
    fn chain_matches_on_demand_operators() {
        let cfg = config(Potential::zero());
        let grid = SpaceTimeGrid::build(&cfg, |t| -1.0 - t, |_| 1.0).unwrap();
        let builder = TransitionBuilder::new(&cfg, &grid);
        let chain = OperatorChain::build(&builder).unwrap();
        assert_eq!(chain.operators().len(), grid.steps());
        for k in [0, 7, grid.steps() - 1] {
            assert_eq!(*chain.operator(k).unwrap(), *builder.operator(k).unwrap());
        }
    }

    #[test]
    fn bad_diffusion_is_an_instability() {
        let cfg = SolverConfig::builder()
            .with_x0(0.0)
            .with_horizon(1.0)
            .with_drift(|_, _| 0.0)
            .with_diffusion(|_, x| x)
            .with_potential(Potential::zero())
            .with_target(TargetSet::Everywhere)
            .with_bridge_mode(BridgeMode::PiecewiseLinear)
            .one_sided(false)
            .with_steps(4)
            .with_delta(0.0)
            .with_terminal_power(0.5)
            .with_gamma(1.0)
            .with_integration_scheme(IntegrationScheme::Trapezoidal)
            .with_transition_scheme(TransitionScheme::Trinomial)
            .build()
            .unwrap();
        let grid = SpaceTimeGrid::build(&cfg, |_| -1.0, |_| 1.0).unwrap();
        let err = TransitionBuilder::new(&cfg, &grid).build_step(0).unwrap_err();
        assert!(matches!(err, Error::NumericalInstability { step: 0, .. }));
    }
}
