//! Brownian-bridge correction of lattice transitions.
//!
//! A transition that starts and ends inside the corridor may still have
//! crossed a boundary in between. Conditioning on both endpoints, the path
//! is approximately a Brownian bridge with variance `σ²(t_k, x)·Δt`, and
//! the boundaries are replaced by the chords between their grid values.

use bcp_core::Real;
use bcp_math::{one_sided_survival, two_sided_survival};

use crate::config::BridgeMode;
use crate::grid::SpaceLevel;

/// Multiplies raw transition probabilities by the bridge non-crossing
/// probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCorrector {
    mode: BridgeMode,
    one_sided: bool,
}

impl BridgeCorrector {
    /// Corrector for `mode`; with `one_sided` only the upper boundary kills.
    pub fn new(mode: BridgeMode, one_sided: bool) -> Self {
        Self { mode, one_sided }
    }

    /// Probability that the bridge from `x` on `from` to `y` on `to` stays
    /// inside the corridor.
    pub fn survival(&self, from: &SpaceLevel, x: Real, to: &SpaceLevel, y: Real, variance: Real) -> Real {
        match self.mode {
            BridgeMode::PiecewiseLinear if self.one_sided => {
                one_sided_survival(from.upper() - x, to.upper() - y, variance)
            }
            BridgeMode::PiecewiseLinear => two_sided_survival(
                x - from.lower(),
                y - to.lower(),
                from.upper() - from.lower(),
                to.upper() - to.lower(),
                variance,
            ),
        }
    }
}
