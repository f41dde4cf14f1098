//! Non-uniform space-time lattice.
//!
//! Time is uniform, `t_k = k·Δt` with `Δt = T/n`. The space lattice of level
//! `k` is the arithmetic progression `x₀ + j·h_k` restricted to the open
//! corridor `(g₋(t_k), g₊(t_k))`. Spacing is `h_k = γ·Δt^{1/2+δ}` except on
//! the terminal level, where `h_n = γ·Δt^{pn}`.
//!
//! A level whose anchored progression misses the corridor entirely (a
//! corridor narrower than one spacing) is rebuilt as a single node at the
//! corridor midpoint, so every level holds at least one node.

use bcp_core::{Amplitude, Error, Real, Result, Size, Time};
use tracing::{debug, instrument};

use crate::config::SolverConfig;

/// Largest number of nodes a single level may hold.
pub const MAX_LEVEL_NODES: Size = 20_000_000;

/// Which boundary of the corridor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySide {
    /// `g₊`.
    Upper,
    /// `g₋`.
    Lower,
}

// ─── SpaceLevel ───────────────────────────────────────────────────────────────

/// Nodes of one time level: `origin + j·step` for `j ∈ [first, last]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceLevel {
    time: Time,
    origin: Real,
    step: Real,
    first: i64,
    last: i64,
    lower: Real,
    upper: Real,
}

impl SpaceLevel {
    /// Time `t_k` of the level.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Node spacing `h_k`.
    pub fn step(&self) -> Real {
        self.step
    }

    /// Lower boundary value `g₋(t_k)`.
    pub fn lower(&self) -> Real {
        self.lower
    }

    /// Upper boundary value `g₊(t_k)`.
    pub fn upper(&self) -> Real {
        self.upper
    }

    /// Boundary value on `side`.
    pub fn boundary(&self, side: BoundarySide) -> Real {
        match side {
            BoundarySide::Upper => self.upper,
            BoundarySide::Lower => self.lower,
        }
    }

    /// Number of nodes `m_k`.
    pub fn len(&self) -> Size {
        (self.last - self.first + 1) as Size
    }

    /// Always `false`: a level holds at least one node.
    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// Location of node `i` (0-based within the level).
    pub fn node(&self, i: Size) -> Real {
        self.lattice_point(self.first + i as i64)
    }

    /// All node locations, ascending.
    pub fn nodes(&self) -> Vec<Real> {
        (0..self.len()).map(|i| self.node(i)).collect()
    }

    /// Location of lattice point `j`, whether or not it is a node.
    pub fn lattice_point(&self, j: i64) -> Real {
        self.origin + j as Real * self.step
    }

    /// Lattice index nearest to `x`.
    pub fn nearest_lattice_index(&self, x: Real) -> i64 {
        ((x - self.origin) / self.step).round() as i64
    }

    /// Node index of lattice point `j`, `None` when `j` lies outside the
    /// corridor.
    pub fn index_of(&self, j: i64) -> Option<Size> {
        (self.first..=self.last)
            .contains(&j)
            .then(|| (j - self.first) as Size)
    }

    /// Derivative in `x`, at the boundary on `side`, of a nodal function
    /// that vanishes on the boundary.
    ///
    /// Uses the second-order one-sided difference through the boundary zero,
    /// the outermost node (distance `d`) and its neighbour (distance `d+h`):
    /// `∂ = ∓(f₁(d+h)² − f₂d²) / (d(d+h)h)`, upper sign at `g₊`. With one node
    /// it degrades to `∓f₁/d`.
    pub fn boundary_slope(&self, values: &[Amplitude], side: BoundarySide) -> Amplitude {
        let m = values.len().min(self.len());
        if m == 0 {
            return Amplitude::new(0.0, 0.0);
        }
        let h = self.step;
        let (d, f1, f2) = match side {
            BoundarySide::Upper => (
                self.upper - self.node(m - 1),
                values[m - 1],
                (m >= 2).then(|| values[m - 2]),
            ),
            BoundarySide::Lower => (
                self.node(0) - self.lower,
                values[0],
                (m >= 2).then(|| values[1]),
            ),
        };
        let inward = match f2 {
            Some(f2) => (f1 * ((d + h) * (d + h)) - f2 * (d * d)) / (d * (d + h) * h),
            None => f1 / d,
        };
        match side {
            BoundarySide::Upper => -inward,
            BoundarySide::Lower => inward,
        }
    }
}

/// Index range `[first, last]` of lattice points strictly inside
/// `(lower, upper)`.
fn interior_range(origin: Real, step: Real, lower: Real, upper: Real) -> Option<(i64, i64)> {
    let at = |j: i64| origin + j as Real * step;

    let mut first = ((lower - origin) / step).floor() as i64 + 1;
    while at(first - 1) > lower {
        first -= 1;
    }
    while at(first) <= lower {
        first += 1;
    }

    let mut last = ((upper - origin) / step).ceil() as i64 - 1;
    while at(last + 1) < upper {
        last += 1;
    }
    while at(last) >= upper {
        last -= 1;
    }

    (first <= last).then_some((first, last))
}

// ─── SpaceTimeGrid ────────────────────────────────────────────────────────────

/// The full lattice: `n + 1` levels plus the sampled boundary values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceTimeGrid {
    levels: Vec<SpaceLevel>,
    dt: Time,
    start_index: Size,
    one_sided: bool,
}

impl SpaceTimeGrid {
    /// Sample the boundaries at every grid time and lay out the nodes.
    ///
    /// # Errors
    /// [`Error::Boundary`] when a boundary value is not finite, when
    /// `g₋(t_k) ≥ g₊(t_k)`, or when `x₀` is not strictly inside the corridor
    /// at `t₀`; [`Error::Configuration`] when a level would exceed
    /// [`MAX_LEVEL_NODES`].
    #[instrument(level = "debug", skip_all, fields(steps = config.steps()))]
    pub fn build<L, U>(config: &SolverConfig, g_minus: L, g_plus: U) -> Result<Self>
    where
        L: Fn(Time) -> Real,
        U: Fn(Time) -> Real,
    {
        let n = config.steps();
        let dt = config.dt();
        let x0 = config.x0();
        let mut levels = Vec::with_capacity(n + 1);

        for k in 0..=n {
            let time = if k == n { config.horizon() } else { k as Real * dt };
            let lower = g_minus(time);
            let upper = g_plus(time);
            let boundary_error = |reason: String| Error::Boundary { index: k, time, reason };

            if !lower.is_finite() || !upper.is_finite() {
                return Err(boundary_error(format!(
                    "boundary values must be finite, got g-={lower}, g+={upper}"
                )));
            }
            if lower >= upper {
                return Err(boundary_error(format!(
                    "lower boundary {lower} is not below upper boundary {upper}"
                )));
            }
            if k == 0 && !(lower < x0 && x0 < upper) {
                return Err(boundary_error(format!(
                    "x0 = {x0} is not strictly inside ({lower}, {upper})"
                )));
            }

            let step = config.space_step(k);
            let estimate = (upper - lower) / step;
            if !(estimate < MAX_LEVEL_NODES as Real) {
                return Err(Error::Configuration(format!(
                    "level {k} would hold about {estimate:.0} nodes (spacing {step:e}); \
                     at most {MAX_LEVEL_NODES} are allowed"
                )));
            }

            let level = match interior_range(x0, step, lower, upper) {
                Some((first, last)) => SpaceLevel { time, origin: x0, step, first, last, lower, upper },
                None => SpaceLevel {
                    time,
                    origin: 0.5 * (lower + upper),
                    step,
                    first: 0,
                    last: 0,
                    lower,
                    upper,
                },
            };
            levels.push(level);
        }

        let start_index = levels[0].index_of(0).ok_or_else(|| Error::Boundary {
            index: 0,
            time: 0.0,
            reason: format!("x0 = {x0} does not fall on a level-0 node"),
        })?;

        let grid = Self { levels, dt, start_index, one_sided: config.one_sided() };
        debug!(
            levels = grid.levels.len(),
            max_nodes = grid.max_level_len(),
            total_nodes = grid.total_nodes(),
            "space-time grid built"
        );
        Ok(grid)
    }

    /// Number of time steps `n`.
    pub fn steps(&self) -> Size {
        self.levels.len() - 1
    }

    /// Time step `Δt`.
    pub fn dt(&self) -> Time {
        self.dt
    }

    /// Whether the lower boundary only truncates the lattice.
    pub fn one_sided(&self) -> bool {
        self.one_sided
    }

    /// Level `k`.
    pub fn level(&self, k: Size) -> &SpaceLevel {
        &self.levels[k]
    }

    /// All levels, `k = 0..=n`.
    pub fn levels(&self) -> &[SpaceLevel] {
        &self.levels
    }

    /// Grid times `t_0..=t_n`.
    pub fn times(&self) -> Vec<Time> {
        self.levels.iter().map(SpaceLevel::time).collect()
    }

    /// Index of `x₀` within level 0.
    pub fn start_index(&self) -> Size {
        self.start_index
    }

    /// `max_k m_k`.
    pub fn max_level_len(&self) -> Size {
        self.levels.iter().map(SpaceLevel::len).max().unwrap_or(0)
    }

    /// `Σ_k m_k`.
    pub fn total_nodes(&self) -> Size {
        self.levels.iter().map(SpaceLevel::len).sum()
    }
}
