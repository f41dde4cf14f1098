//! Forward propagation of the taboo mass (FKE).

use bcp_core::{Amplitude, Error, Real, Result, Size, Time};
use num_traits::{One, Zero};
use tracing::{debug, instrument, trace};

use crate::config::TargetSet;
use crate::operator::OperatorSource;

/// Result of a forward pass.
///
/// Holds the surviving mass per node, either for every level or for the
/// terminal level only.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardSolution {
    levels: Vec<Vec<Amplitude>>,
    retained: bool,
    times: Vec<Time>,
    steps: Vec<Real>,
}

impl ForwardSolution {
    /// `Σ` terminal mass: the (Feynman-Kac weighted) probability of staying
    /// inside the corridor and ending in the target set.
    pub fn non_crossing_probability(&self) -> Amplitude {
        self.terminal_mass().iter().sum()
    }

    /// `1 − non_crossing_probability()`.
    pub fn crossing_probability(&self) -> Amplitude {
        Amplitude::one() - self.non_crossing_probability()
    }

    /// Mass at the level-`n` nodes.
    pub fn terminal_mass(&self) -> &[Amplitude] {
        self.levels.last().map(Vec::as_slice).unwrap_or(&[])
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

    /// All levels, `k = 0..=n`, when history was retained.
    pub fn history(&self) -> Option<&[Vec<Amplitude>]> {
        self.retained.then_some(self.levels.as_slice())
    }

    /// Mass at the nodes of level `k`.
    ///
    /// # Errors
    /// [`Error::MissingHistory`] for `k < n` on a terminal-only solution.
    pub fn mass(&self, k: Size) -> Result<&[Amplitude]> {
        let n = self.steps();
        if k > n {
            return Err(Error::MissingHistory(format!("level {k} beyond the horizon (n = {n})")));
        }
        match (self.retained, k == n) {
            (true, _) => Ok(&self.levels[k]),
            (false, true) => Ok(self.terminal_mass()),
            (false, false) => Err(Error::MissingHistory(format!(
                "level {k} requested from a terminal-only forward solution"
            ))),
        }
    }

    /// Taboo transition density at level `k`: mass divided by the spacing.
    pub fn taboo_density(&self, k: Size) -> Result<Vec<Amplitude>> {
        let mass = self.mass(k)?;
        let h = self.steps[k];
        Ok(mass.iter().map(|&u| u / h).collect())
    }
}

/// Push unit mass at `x₀` through every step of `source`.
///
/// Mass leaving the corridor is absorbed; the terminal level is multiplied
/// by the indicator of `target`.
#[instrument(level = "debug", skip(source), fields(steps = source.grid().steps()))]
pub fn propagate_forward<S>(source: &S, target: TargetSet, retain_history: bool) -> Result<ForwardSolution>
where
    S: OperatorSource + ?Sized,
{
    let grid = source.grid();
    let n = grid.steps();

    let mut mass = vec![Amplitude::zero(); grid.level(0).len()];
    mass[grid.start_index()] = Amplitude::one();
    let mut levels = Vec::with_capacity(if retain_history { n + 1 } else { 1 });

    for k in 0..n {
        let op = source.operator(k)?;
        let next = op.apply_forward(&mass);
        if retain_history {
            levels.push(std::mem::replace(&mut mass, next));
        } else {
            mass = next;
        }
        trace!(step = k + 1, survival = %mass.iter().sum::<Amplitude>(), "forward step");
    }

    let terminal = grid.level(n);
    for (i, u) in mass.iter_mut().enumerate() {
        *u *= target.indicator(terminal.node(i));
    }
    levels.push(mass);

    let solution = ForwardSolution {
        levels,
        retained: retain_history,
        times: grid.times(),
        steps: grid.levels().iter().map(|l| l.step()).collect(),
    };
    debug!(probability = %solution.non_crossing_probability(), "forward pass done");
    Ok(solution)
}
