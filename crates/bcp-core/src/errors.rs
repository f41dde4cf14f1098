//! Error types for the boundary-crossing solver.
//!
//! Every failure of a solve is reported through a single `thiserror`-derived
//! enum. Configuration problems are caught before any grid is built; the
//! remaining variants carry the time index (and node, where relevant) at
//! which the computation broke down. The [`ensure_config!`] and
//! [`fail_config!`] macros are shorthands for the configuration checks.

use crate::{Real, Size, Time};
use thiserror::Error;

/// The top-level error type used throughout the workspace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Invalid configuration (step count, horizon, spacing parameters,
    /// target interval, unknown tag, missing field).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The boundary corridor is empty or ill-formed at a sampled time.
    #[error("boundary error at time index {index} (t = {time}): {reason}")]
    Boundary {
        /// Offending time index.
        index: Size,
        /// Time `t_index`.
        time: Time,
        /// What went wrong.
        reason: String,
    },

    /// Transition probabilities could not be made consistent with the
    /// drift and diffusion (grid too coarse for the coefficients).
    #[error("numerical instability at time index {step}, node {node} (x = {x}): {detail}")]
    NumericalInstability {
        /// Time index of the originating level.
        step: Size,
        /// Node index within the level.
        node: Size,
        /// Node location.
        x: Real,
        /// Description of the instability.
        detail: String,
    },

    /// A bridge factor or potential discount produced a non-finite value.
    #[error("numerical overflow at time index {step}, node {node}: {detail}")]
    NumericalOverflow {
        /// Time index of the originating level.
        step: Size,
        /// Node index within the level.
        node: Size,
        /// Description of the offending quantity.
        detail: String,
    },

    /// A per-level quantity was requested from a solution that only kept
    /// its terminal level.
    #[error("solution history not retained: {0}")]
    MissingHistory(String),
}

/// Shorthand `Result` type used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Configuration(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use bcp_core::{ensure_config, errors::Error};
/// fn steps(n: usize) -> bcp_core::errors::Result<usize> {
///     ensure_config!(n >= 1, "step count must be at least 1, got {n}");
///     Ok(n)
/// }
/// assert!(steps(4).is_ok());
/// assert!(matches!(steps(0), Err(Error::Configuration(_))));
/// ```
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Configuration(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Configuration(...))` immediately.
///
/// # Example
/// ```
/// use bcp_core::{fail_config, errors::Error};
/// fn unknown(tag: &str) -> bcp_core::errors::Result<()> {
///     fail_config!("unknown tag '{tag}'");
/// }
/// assert!(unknown("euler").is_err());
/// ```
#[macro_export]
macro_rules! fail_config {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Configuration(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_error_reports_index_and_time() {
        let e = Error::Boundary {
            index: 7,
            time: 0.35,
            reason: "lower boundary 1 is not below upper boundary 0.5".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("time index 7"));
        assert!(msg.contains("0.35"));
        assert!(msg.contains("not below"));
    }

    #[test]
    fn instability_error_reports_node() {
        let e = Error::NumericalInstability {
            step: 3,
            node: 12,
            x: -0.25,
            detail: "clipped mass 0.2 exceeds tolerance 1e-6".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("node 12"));
        assert!(msg.contains("x = -0.25"));
    }

    #[test]
    fn ensure_config_short_circuits() {
        fn check(gamma: Real) -> Result<Real> {
            ensure_config!(gamma > 0.0, "gamma must be positive, got {gamma}");
            Ok(gamma)
        }
        assert_eq!(check(1.5), Ok(1.5));
        match check(-1.0) {
            Err(Error::Configuration(msg)) => assert!(msg.contains("-1")),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
