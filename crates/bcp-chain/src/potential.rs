//! Feynman-Kac discounting of transition weights.

use bcp_core::{Amplitude, Error, Real, Result, Size, Time};

use crate::config::Potential;

/// Discount factor `exp(−V(t, x)·Δt)` for a transition leaving node `node`
/// of level `step` at `(t, x)`.
///
/// # Errors
/// [`Error::NumericalOverflow`] when `V` or the factor is not finite.
pub fn discount(
    potential: &Potential,
    t: Time,
    x: Real,
    dt: Time,
    step: Size,
    node: Size,
) -> Result<Amplitude> {
    if let Potential::Zero = potential {
        return Ok(Amplitude::new(1.0, 0.0));
    }
    let v = potential.value(t, x);
    let factor = (-(v * dt)).exp();
    if factor.re.is_finite() && factor.im.is_finite() {
        Ok(factor)
    } else {
        Err(Error::NumericalOverflow {
            step,
            node,
            detail: format!("exp(-V dt) is not finite for V({t}, {x}) = {v}"),
        })
    }
}
