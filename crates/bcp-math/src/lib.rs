//! # bcp-math
//!
//! Numerical building blocks for the boundary-crossing solver:
//! discrete quadrature over time-grid samples and closed-form
//! Brownian-bridge non-crossing probabilities for straight-line
//! boundaries.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Brownian-bridge survival against one line or a two-line corridor.
pub mod bridge;

/// Trapezoidal / Simpson rules over `(t, value)` sequences.
pub mod quadrature;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use bridge::{one_sided_survival, two_sided_survival};
pub use quadrature::{integrate, simpson, sqrt_singular_end_panel, trapezoid, IntegrationScheme};
