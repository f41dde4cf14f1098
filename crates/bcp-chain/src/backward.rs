//! Backward propagation of the value function (BKE).

use bcp_core::{Amplitude, Error, Real, Result, Size, Time};
use tracing::{debug, instrument, trace};

use crate::grid::BoundarySide;
use crate::operator::OperatorSource;

/// Result of a backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardSolution {
    levels: Vec<Vec<Amplitude>>,
    retained: bool,
    value_at_start: Amplitude,
    upper_slope: Vec<Amplitude>,
    lower_slope: Vec<Amplitude>,
    times: Vec<Time>,
}

impl BackwardSolution {
    /// `v(0, x₀)`.
    pub fn value_at_start(&self) -> Amplitude {
        self.value_at_start
    }

    /// `v(0, x₀)`; equals the forward non-crossing probability when the
    /// payoff is the target indicator.
    pub fn non_crossing_probability(&self) -> Amplitude {
        self.value_at_start
    }

    /// Whether every level was kept.
    pub fn has_history(&self) -> bool {
        self.retained
    }

    /// Number of time steps `n`.
    pub fn steps(&self) -> Size {
        self.times.len() - 1
    }

    /// Grid times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Values at the level-0 nodes.
    pub fn initial_values(&self) -> &[Amplitude] {
        &self.levels[0]
    }

    /// Values at the nodes of level `k`.
    ///
    /// # Errors
    /// [`Error::MissingHistory`] for `k > 0` on a solution that kept only
    /// level 0.
    pub fn values(&self, k: Size) -> Result<&[Amplitude]> {
        let n = self.steps();
        if k > n {
            return Err(Error::MissingHistory(format!("level {k} beyond the horizon (n = {n})")));
        }
        match (self.retained, k) {
            (true, _) | (false, 0) => Ok(&self.levels[k]),
            (false, _) => Err(Error::MissingHistory(format!(
                "level {k} requested from a backward solution that kept only level 0"
            ))),
        }
    }

    /// `∂ₓv(t_k, g(t_k))` on `side`, one entry per level `k = 0..=n`.
    pub fn boundary_derivative(&self, side: BoundarySide) -> &[Amplitude] {
        match side {
            BoundarySide::Upper => &self.upper_slope,
            BoundarySide::Lower => &self.lower_slope,
        }
    }
}

/// Pull `payoff` at the terminal nodes back through every step of
/// `source`.
///
/// Boundary derivatives are recorded at each level whether or not the
/// value history is retained.
#[instrument(level = "debug", skip(source, payoff), fields(steps = source.grid().steps()))]
pub fn propagate_backward<S, P>(source: &S, payoff: P, retain_history: bool) -> Result<BackwardSolution>
where
    S: OperatorSource + ?Sized,
    P: Fn(Real) -> Real,
{
    let grid = source.grid();
    let n = grid.steps();

    let terminal = grid.level(n);
    let mut values: Vec<Amplitude> = terminal
        .nodes()
        .into_iter()
        .map(|y| Amplitude::new(payoff(y), 0.0))
        .collect();

    let mut upper_slope = vec![Amplitude::new(0.0, 0.0); n + 1];
    let mut lower_slope = vec![Amplitude::new(0.0, 0.0); n + 1];
    upper_slope[n] = terminal.boundary_slope(&values, BoundarySide::Upper);
    lower_slope[n] = terminal.boundary_slope(&values, BoundarySide::Lower);

    let mut levels = Vec::with_capacity(if retain_history { n + 1 } else { 1 });
    for k in (0..n).rev() {
        let op = source.operator(k)?;
        let previous = op.apply_adjoint(&values);
        if retain_history {
            levels.push(std::mem::replace(&mut values, previous));
        } else {
            values = previous;
        }
        let level = grid.level(k);
        upper_slope[k] = level.boundary_slope(&values, BoundarySide::Upper);
        lower_slope[k] = level.boundary_slope(&values, BoundarySide::Lower);
        trace!(step = k, "backward step");
    }
    let value_at_start = values[grid.start_index()];
    levels.push(values);
    levels.reverse();

    debug!(value = %value_at_start, "backward pass done");
    Ok(BackwardSolution {
        levels,
        retained: retain_history,
        value_at_start,
        upper_slope,
        lower_slope,
        times: grid.times(),
    })
}
