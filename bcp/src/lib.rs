//! # bcp
//!
//! Boundary-crossing probabilities of one-dimensional diffusions by
//! Markov-chain approximation.
//!
//! This crate is a **façade** that re-exports the public items of the
//! workspace crates. Application code should depend on this crate rather
//! than the individual `bcp-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use bcp::prelude::*;
//!
//! // Ornstein-Uhlenbeck process inside a closing corridor.
//! let config = SolverConfig::builder()
//!     .with_x0(0.0)
//!     .with_horizon(1.0)
//!     .with_drift(|_, x| -x)
//!     .with_diffusion(|_, _| 0.5)
//!     .with_potential(Potential::zero())
//!     .with_target(TargetSet::Everywhere)
//!     .with_bridge_mode("piecewise-linear".parse()?)
//!     .one_sided(false)
//!     .with_steps(32)
//!     .with_delta(0.25)
//!     .with_terminal_power(1.0)
//!     .with_gamma(1.0)
//!     .with_integration_scheme("trapezoidal".parse()?)
//!     .with_transition_scheme("gaussian".parse()?)
//!     .build()?;
//!
//! let lower = |t: Real| -1.0 + 0.4 * t;
//! let upper = |t: Real| 1.0 - 0.4 * t;
//! let forward = forward_solve(&config, lower, upper, false)?;
//! let backward = backward_solve(&config, lower, upper, false)?;
//!
//! let p = forward.non_crossing_probability();
//! assert!(p.re > 0.0 && p.re < 1.0);
//! assert!((p - backward.non_crossing_probability()).norm() < 1e-12);
//! # Ok::<(), bcp::core::Error>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use bcp_core as core;

/// Quadrature rules and Brownian-bridge formulas.
pub use bcp_math as math;

/// Lattice, transition operators, propagators and sensitivities.
pub use bcp_chain as chain;

/// The items most programs need.
pub mod prelude {
    pub use bcp_chain::{
        backward_solve, backward_solve_with_payoff, first_passage_density, forward_solve,
        gateaux_derivative, BackwardSolution, BoundaryCrossingProblem, BoundarySide, BridgeMode,
        ForwardSolution, Potential, SolverConfig, TargetSet, TransitionScheme,
    };
    pub use bcp_core::{Amplitude, Error, Real, Result, Time};
    pub use bcp_math::IntegrationScheme;
}
