//! # bcp-core
//!
//! Core types and error definitions shared by every crate in the
//! boundary-crossing workspace: numeric aliases, the complex amplitude
//! type carried through the propagators, and the error hierarchy.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure_config!` / `fail_config!` macros.
pub mod errors;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the workspace.
pub type Real = f64;

/// A time measurement on the solver horizon `[0, T]`.
pub type Time = Real;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// Complex amplitude: a transition weight, a surviving mass, or a value
/// function sample. Purely real when the killing potential is real.
pub type Amplitude = num_complex::Complex64;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
