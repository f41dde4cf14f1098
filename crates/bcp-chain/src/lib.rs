//! # bcp-chain
//!
//! Markov-chain approximation of boundary-crossing probabilities for a
//! one-dimensional diffusion `dX = μ(t, X) dt + σ(t, X) dW` killed at rate
//! `V(t, X)`.
//!
//! The diffusion is replaced by a chain on a non-uniform space-time lattice
//! whose one-step laws match the local mean and variance. Each transition is
//! weighted by the Brownian-bridge probability of not touching the boundary
//! chords in between and by `exp(−V·Δt)`. Pushing a point mass forward
//! gives the taboo density and the non-crossing probability; pulling a
//! payoff backward gives the value function and its boundary slope.
//!
//! # Modules
//!
//! * [`config`]: validated solver configuration and its builder
//! * [`grid`]: space-time lattice between the boundaries
//! * [`transition`]: moment-matching one-step probabilities
//! * [`bridge`]: Brownian-bridge crossing correction
//! * [`potential`]: Feynman-Kac discount factors
//! * [`operator`]: weighted step operators, on demand or precomputed
//! * [`forward`] / [`backward`]: the two propagators
//! * [`sensitivity`]: first-passage density and Gateaux derivative
//! * [`problem`]: problem object and one-shot solve functions

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Solver configuration.
pub mod config;

/// Space-time lattice.
pub mod grid;

/// One-step transition probabilities.
pub mod transition;

/// Brownian-bridge correction.
pub mod bridge;

/// Potential discounting.
pub mod potential;

/// Step operators.
pub mod operator;

/// Forward propagator.
pub mod forward;

/// Backward propagator.
pub mod backward;

/// Boundary sensitivities.
pub mod sensitivity;

/// Problem object and entry points.
pub mod problem;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use backward::{propagate_backward, BackwardSolution};
pub use bridge::BridgeCorrector;
pub use config::{
    BridgeMode, CoefficientFn, ComplexCoefficientFn, Potential, SolverConfig, SolverConfigBuilder,
    TargetSet, TransitionScheme, DEFAULT_CLIP_TOLERANCE,
};
pub use forward::{propagate_forward, ForwardSolution};
pub use grid::{BoundarySide, SpaceLevel, SpaceTimeGrid};
pub use operator::{OperatorChain, OperatorSource, StepOperator, TransitionBuilder};
pub use problem::{backward_solve, backward_solve_with_payoff, forward_solve, BoundaryCrossingProblem};
pub use sensitivity::{first_passage_density, gateaux_derivative, taboo_density_slopes};
