//! Discrete quadrature over ordered `(t, value)` samples.
//!
//! The propagators produce per-level quantities on the time grid; these
//! rules reduce such sequences to a single integral estimate. Values may be
//! real or complex: any type that is `Zero`, closed under addition, and
//! scalable by a `Real` works.

use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

use bcp_core::{fail_config, Error, Real, Result, Time};
use num_traits::Zero;

/// Quadrature rule used to reduce per-level sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationScheme {
    /// Composite trapezoidal rule.
    Trapezoidal,
    /// Composite Simpson rule on non-uniform abscissae, with a trapezoidal
    /// last panel when the number of intervals is odd.
    Simpson,
}

impl IntegrationScheme {
    /// Tag accepted by [`FromStr`].
    pub fn tag(&self) -> &'static str {
        match self {
            IntegrationScheme::Trapezoidal => "trapezoidal",
            IntegrationScheme::Simpson => "simpson",
        }
    }
}

impl fmt::Display for IntegrationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for IntegrationScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trapezoidal" | "trapezoid" => Ok(IntegrationScheme::Trapezoidal),
            "simpson" => Ok(IntegrationScheme::Simpson),
            other => fail_config!("unknown integration scheme '{other}'"),
        }
    }
}

/// Composite trapezoidal rule on `(t, value)` pairs.
///
/// $$\sum_{i=0}^{n-2} \tfrac12 (t_{i+1}-t_i)(f_i + f_{i+1}).$$
///
/// Fewer than two points integrate to zero.
pub fn trapezoid<V>(points: &[(Time, V)]) -> V
where
    V: Copy + Zero + Add<Output = V> + Mul<Real, Output = V>,
{
    points
        .windows(2)
        .fold(V::zero(), |acc, w| acc + (w[0].1 + w[1].1) * (0.5 * (w[1].0 - w[0].0)))
}

/// Composite Simpson rule on `(t, value)` pairs with non-uniform spacing.
///
/// Pairs of sub-intervals are integrated with the three-point rule for
/// unequal widths; an odd trailing interval uses the trapezoidal rule.
pub fn simpson<V>(points: &[(Time, V)]) -> V
where
    V: Copy + Zero + Add<Output = V> + Mul<Real, Output = V>,
{
    let n = points.len();
    if n < 3 {
        return trapezoid(points);
    }

    let mut sum = V::zero();
    let mut j = 0;
    while j + 2 < n {
        let (t0, f0) = points[j];
        let (t1, f1) = points[j + 1];
        let (t2, f2) = points[j + 2];
        let dxj = t1 - t0;
        let dxjp1 = t2 - t1;
        let dd = dxj + dxjp1;
        let k = dd / (6.0 * dxjp1 * dxj);
        let alpha = dxjp1 * (2.0 * dxj - dxjp1);
        let beta = dd * dd;
        let gamma = dxj * (2.0 * dxjp1 - dxj);
        sum = sum + f0 * (k * alpha) + f1 * (k * beta) + f2 * (k * gamma);
        j += 2;
    }
    if n % 2 == 0 {
        sum = sum + trapezoid(&points[n - 2..]);
    }
    sum
}

/// Integrate `points` with the selected scheme.
pub fn integrate<V>(scheme: IntegrationScheme, points: &[(Time, V)]) -> V
where
    V: Copy + Zero + Add<Output = V> + Mul<Real, Output = V>,
{
    match scheme {
        IntegrationScheme::Trapezoidal => trapezoid(points),
        IntegrationScheme::Simpson => simpson(points),
    }
}

/// Integral over `[t, end]` of an integrand behaving like `c / √(end − s)`,
/// given its value at `t`.
///
/// With `f(t) = c / √(end − t)` the panel integrates to
/// `2c√(end − t) = 2 (end − t) f(t)`.
pub fn sqrt_singular_end_panel<V>(t: Time, value: V, end: Time) -> V
where
    V: Copy + Mul<Real, Output = V>,
{
    value * (2.0 * (end - t))
}
