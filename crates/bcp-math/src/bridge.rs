//! Non-crossing probabilities of a Brownian bridge against straight-line
//! boundaries.
//!
//! A Brownian bridge with variance parameter `v = σ²Δt`, pinned at its two
//! endpoints, is compared with boundaries that are straight lines between
//! their values at the two endpoint times. Only distances enter the
//! formulas:
//!
//! * one boundary at distances `a₀`, `a₁` from the bridge endpoints:
//!   ```text
//!   P(no crossing) = 1 − exp(−2 a₀ a₁ / v)
//!   ```
//! * a corridor whose lower line is at distances `b₀`, `b₁` and whose widths
//!   are `w₀`, `w₁` (method of images, one image pair per `j`):
//!   ```text
//!   P(stay inside) = Σ_j [ exp(−2j(j w₀w₁ + w₀b₁ − w₁b₀)/v)
//!                         − exp(−2(j w₀ + b₀)(j w₁ + b₁)/v) ]
//!   ```
//!   The `j = 0` pair is the one-sided formula for the lower line, the
//!   `j = −1` second term the one-sided formula for the upper line.

use bcp_core::Real;

/// Terms below this magnitude end the image series.
const SERIES_TOLERANCE: Real = 1e-17;

/// Upper bound on image pairs `±j` summed.
const MAX_IMAGES: i32 = 256;

/// Probability that a bridge stays strictly on one side of a straight line.
///
/// `a0`, `a1` are the (signed) distances from the bridge endpoints to the
/// line, positive on the admissible side. Returns 0 when either endpoint is
/// not strictly admissible.
pub fn one_sided_survival(a0: Real, a1: Real, variance: Real) -> Real {
    if a0 <= 0.0 || a1 <= 0.0 {
        return 0.0;
    }
    if variance <= 0.0 {
        return 1.0;
    }
    -(-2.0 * a0 * a1 / variance).exp_m1()
}

/// Probability that a bridge stays strictly inside a corridor between two
/// straight lines.
///
/// `b0`, `b1` are the distances from the bridge endpoints to the lower line;
/// `w0`, `w1` are the corridor widths at the two endpoint times. The series
/// is summed until both image terms fall below [`SERIES_TOLERANCE`] and the
/// result is clipped to `[0, 1]`.
pub fn two_sided_survival(b0: Real, b1: Real, w0: Real, w1: Real, variance: Real) -> Real {
    if b0 <= 0.0 || b1 <= 0.0 || b0 >= w0 || b1 >= w1 {
        return 0.0;
    }
    if variance <= 0.0 {
        return 1.0;
    }

    let image = |j: Real| {
        let direct = (-2.0 * j * (j * w0 * w1 + w0 * b1 - w1 * b0) / variance).exp();
        let reflected = (-2.0 * (j * w0 + b0) * (j * w1 + b1) / variance).exp();
        (direct, reflected)
    };

    let mut sum = one_sided_survival(b0, b1, variance);
    for j in 1..=MAX_IMAGES {
        let (dp, rp) = image(j as Real);
        let (dm, rm) = image(-(j as Real));
        sum += (dp - rp) + (dm - rm);
        if dp.max(rp).max(dm).max(rm) < SERIES_TOLERANCE {
            break;
        }
    }
    sum.clamp(0.0, 1.0)
}
