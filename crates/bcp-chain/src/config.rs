//! Solver configuration.
//!
//! A [`SolverConfig`] bundles the diffusion coefficients, the killing
//! potential, the target set and the lattice parameters of one solve. It is
//! assembled through [`SolverConfigBuilder`], which insists on every field
//! being set explicitly and validates the whole record before handing it
//! out. Coefficients are shared behind `Arc`, so cloning a configuration is
//! cheap and the result can be read from several worker threads.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bcp_core::{ensure_config, fail_config, Amplitude, Error, Real, Result, Size, Time};
use bcp_math::IntegrationScheme;

/// Default bound on the probability mass that may be clipped from a
/// transition row before the row is rejected.
pub const DEFAULT_CLIP_TOLERANCE: Real = 1e-6;

/// A real coefficient `(t, x) ↦ value`, e.g. the drift `μ` or diffusion `σ`.
pub type CoefficientFn = Arc<dyn Fn(Time, Real) -> Real + Send + Sync>;

/// A complex coefficient `(t, x) ↦ value`.
pub type ComplexCoefficientFn = Arc<dyn Fn(Time, Real) -> Amplitude + Send + Sync>;

// ─── Potential ────────────────────────────────────────────────────────────────

/// Killing potential `V(t, x)` of the Feynman-Kac functional.
#[derive(Clone)]
pub enum Potential {
    /// `V ≡ 0`: no killing, no discounting.
    Zero,
    /// Real-valued potential.
    Real(CoefficientFn),
    /// Complex-valued potential.
    Complex(ComplexCoefficientFn),
}

impl Potential {
    /// The zero potential.
    pub fn zero() -> Self {
        Potential::Zero
    }

    /// Wrap a real potential.
    pub fn real<F>(f: F) -> Self
    where
        F: Fn(Time, Real) -> Real + Send + Sync + 'static,
    {
        Potential::Real(Arc::new(f))
    }

    /// Wrap a complex potential.
    pub fn complex<F>(f: F) -> Self
    where
        F: Fn(Time, Real) -> Amplitude + Send + Sync + 'static,
    {
        Potential::Complex(Arc::new(f))
    }

    /// `true` unless the potential is complex-valued.
    pub fn is_real(&self) -> bool {
        !matches!(self, Potential::Complex(_))
    }

    /// Evaluate `V(t, x)`.
    pub fn value(&self, t: Time, x: Real) -> Amplitude {
        match self {
            Potential::Zero => Amplitude::new(0.0, 0.0),
            Potential::Real(f) => Amplitude::new(f(t, x), 0.0),
            Potential::Complex(f) => f(t, x),
        }
    }
}

impl fmt::Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Potential::Zero => f.write_str("Potential::Zero"),
            Potential::Real(_) => f.write_str("Potential::Real(..)"),
            Potential::Complex(_) => f.write_str("Potential::Complex(..)"),
        }
    }
}

// ─── Target set ───────────────────────────────────────────────────────────────

/// Set the process must end in at time `T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSet {
    /// No terminal restriction.
    Everywhere,
    /// Terminal value must lie in `[lower, upper]`.
    Interval {
        /// Left end `a`.
        lower: Real,
        /// Right end `b`.
        upper: Real,
    },
}

impl TargetSet {
    /// Whether `x` belongs to the set.
    pub fn contains(&self, x: Real) -> bool {
        match *self {
            TargetSet::Everywhere => true,
            TargetSet::Interval { lower, upper } => (lower..=upper).contains(&x),
        }
    }

    /// Indicator function of the set.
    pub fn indicator(&self, x: Real) -> Real {
        if self.contains(x) {
            1.0
        } else {
            0.0
        }
    }
}

// ─── Tags ─────────────────────────────────────────────────────────────────────

/// Family of Brownian-bridge corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Boundaries are replaced by straight lines between consecutive grid
    /// times; the one-sided flag selects the single-line or corridor formula.
    PiecewiseLinear,
}

impl BridgeMode {
    /// Tag accepted by [`FromStr`].
    pub fn tag(&self) -> &'static str {
        match self {
            BridgeMode::PiecewiseLinear => "piecewise-linear",
        }
    }
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BridgeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piecewise-linear" | "linear" => Ok(BridgeMode::PiecewiseLinear),
            other => fail_config!("unknown bridge mode '{other}'"),
        }
    }
}

/// How one-step transition probabilities are laid out on the next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionScheme {
    /// Up / stay / down around the node nearest the conditional mean.
    Trinomial,
    /// Moment-corrected Gaussian kernel over every node within six standard
    /// deviations of the conditional mean.
    Gaussian,
}

impl TransitionScheme {
    /// Tag accepted by [`FromStr`].
    pub fn tag(&self) -> &'static str {
        match self {
            TransitionScheme::Trinomial => "trinomial",
            TransitionScheme::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for TransitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TransitionScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trinomial" => Ok(TransitionScheme::Trinomial),
            "gaussian" => Ok(TransitionScheme::Gaussian),
            other => fail_config!("unknown transition scheme '{other}'"),
        }
    }
}

// ─── SolverConfig ─────────────────────────────────────────────────────────────

/// Validated, immutable configuration of a boundary-crossing solve.
#[derive(Clone)]
pub struct SolverConfig {
    x0: Real,
    horizon: Time,
    drift: CoefficientFn,
    diffusion: CoefficientFn,
    potential: Potential,
    target: TargetSet,
    bridge_mode: BridgeMode,
    one_sided: bool,
    steps: Size,
    delta: Real,
    terminal_power: Real,
    gamma: Real,
    integration_scheme: IntegrationScheme,
    transition_scheme: TransitionScheme,
    clip_tolerance: Real,
}

impl SolverConfig {
    /// Start assembling a configuration.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::new()
    }

    /// Starting point `x₀`.
    pub fn x0(&self) -> Real {
        self.x0
    }

    /// Horizon `T`.
    pub fn horizon(&self) -> Time {
        self.horizon
    }

    /// Number of time steps `n`.
    pub fn steps(&self) -> Size {
        self.steps
    }

    /// Time step `Δt = T / n`.
    pub fn dt(&self) -> Time {
        self.horizon / self.steps as Real
    }

    /// Drift `μ(t, x)`.
    pub fn drift(&self, t: Time, x: Real) -> Real {
        (self.drift)(t, x)
    }

    /// Diffusion `σ(t, x)`.
    pub fn diffusion(&self, t: Time, x: Real) -> Real {
        (self.diffusion)(t, x)
    }

    /// Killing potential.
    pub fn potential(&self) -> &Potential {
        &self.potential
    }

    /// Terminal target set.
    pub fn target(&self) -> TargetSet {
        self.target
    }

    /// Bridge-correction family.
    pub fn bridge_mode(&self) -> BridgeMode {
        self.bridge_mode
    }

    /// Whether only the upper boundary kills (the lower one then merely
    /// truncates the lattice).
    pub fn one_sided(&self) -> bool {
        self.one_sided
    }

    /// Space-step exponent offset `δ`.
    pub fn delta(&self) -> Real {
        self.delta
    }

    /// Exponent `pn` of the terminal space step.
    pub fn terminal_power(&self) -> Real {
        self.terminal_power
    }

    /// Space-scale factor `γ`.
    pub fn gamma(&self) -> Real {
        self.gamma
    }

    /// Quadrature rule for time integrals.
    pub fn integration_scheme(&self) -> IntegrationScheme {
        self.integration_scheme
    }

    /// Layout of one-step transitions.
    pub fn transition_scheme(&self) -> TransitionScheme {
        self.transition_scheme
    }

    /// Largest clipped probability mass tolerated per transition row.
    pub fn clip_tolerance(&self) -> Real {
        self.clip_tolerance
    }

    /// Lattice spacing at time index `k`: `γ·Δt^{1/2+δ}` before the
    /// horizon, `γ·Δt^{pn}` on the terminal level.
    pub fn space_step(&self, k: Size) -> Real {
        let dt = self.dt();
        if k == self.steps {
            self.gamma * dt.powf(self.terminal_power)
        } else {
            self.gamma * dt.powf(0.5 + self.delta)
        }
    }

    fn validate(&self) -> Result<()> {
        ensure_config!(self.x0.is_finite(), "x0 must be finite, got {}", self.x0);
        ensure_config!(
            self.horizon.is_finite() && self.horizon > 0.0,
            "horizon T must be positive and finite, got {}",
            self.horizon
        );
        ensure_config!(self.steps >= 1, "step count n must be at least 1, got {}", self.steps);
        ensure_config!(
            self.gamma.is_finite() && self.gamma > 0.0,
            "space scale gamma must be positive, got {}",
            self.gamma
        );
        ensure_config!(
            self.delta.is_finite() && self.delta >= 0.0,
            "space-step offset delta must be non-negative, got {}",
            self.delta
        );
        ensure_config!(
            self.terminal_power.is_finite() && self.terminal_power > 0.0,
            "terminal space-step power pn must be positive, got {}",
            self.terminal_power
        );
        ensure_config!(
            self.clip_tolerance.is_finite() && self.clip_tolerance >= 0.0,
            "clip tolerance must be non-negative, got {}",
            self.clip_tolerance
        );
        if let TargetSet::Interval { lower, upper } = self.target {
            ensure_config!(
                lower.is_finite() && upper.is_finite() && lower < upper,
                "target interval must satisfy a < b, got [{lower}, {upper}]"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for SolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverConfig")
            .field("x0", &self.x0)
            .field("horizon", &self.horizon)
            .field("potential", &self.potential)
            .field("target", &self.target)
            .field("bridge_mode", &self.bridge_mode)
            .field("one_sided", &self.one_sided)
            .field("steps", &self.steps)
            .field("delta", &self.delta)
            .field("terminal_power", &self.terminal_power)
            .field("gamma", &self.gamma)
            .field("integration_scheme", &self.integration_scheme)
            .field("transition_scheme", &self.transition_scheme)
            .field("clip_tolerance", &self.clip_tolerance)
            .finish_non_exhaustive()
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Builder for [`SolverConfig`].
///
/// Every setter except [`with_clip_tolerance`](Self::with_clip_tolerance)
/// is mandatory: the model (`x0`, horizon, drift, diffusion, potential,
/// target, bridge mode, one-sided flag), the lattice (`steps`, `delta`,
/// terminal power, `gamma`), the integration scheme and the transition
/// scheme ([`TransitionScheme`]). None of them has a default.
/// [`build`](Self::build) names the first missing field.
#[derive(Default)]
pub struct SolverConfigBuilder {
    x0: Option<Real>,
    horizon: Option<Time>,
    drift: Option<CoefficientFn>,
    diffusion: Option<CoefficientFn>,
    potential: Option<Potential>,
    target: Option<TargetSet>,
    bridge_mode: Option<BridgeMode>,
    one_sided: Option<bool>,
    steps: Option<Size>,
    delta: Option<Real>,
    terminal_power: Option<Real>,
    gamma: Option<Real>,
    integration_scheme: Option<IntegrationScheme>,
    transition_scheme: Option<TransitionScheme>,
    clip_tolerance: Option<Real>,
}

impl SolverConfigBuilder {
    /// Begin building a configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting point `x₀`.
    pub fn with_x0(mut self, x0: Real) -> Self {
        self.x0 = Some(x0);
        self
    }

    /// Horizon `T`.
    pub fn with_horizon(mut self, horizon: Time) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Drift `μ(t, x)`.
    pub fn with_drift<F>(mut self, f: F) -> Self
    where
        F: Fn(Time, Real) -> Real + Send + Sync + 'static,
    {
        self.drift = Some(Arc::new(f));
        self
    }

    /// Diffusion `σ(t, x)`; must be positive at every lattice node.
    pub fn with_diffusion<F>(mut self, f: F) -> Self
    where
        F: Fn(Time, Real) -> Real + Send + Sync + 'static,
    {
        self.diffusion = Some(Arc::new(f));
        self
    }

    /// Killing potential `V(t, x)`.
    pub fn with_potential(mut self, potential: Potential) -> Self {
        self.potential = Some(potential);
        self
    }

    /// Terminal target set.
    pub fn with_target(mut self, target: TargetSet) -> Self {
        self.target = Some(target);
        self
    }

    /// Bridge-correction family.
    pub fn with_bridge_mode(mut self, mode: BridgeMode) -> Self {
        self.bridge_mode = Some(mode);
        self
    }

    /// Only the upper boundary kills.
    pub fn one_sided(mut self, flag: bool) -> Self {
        self.one_sided = Some(flag);
        self
    }

    /// Number of time steps `n`.
    pub fn with_steps(mut self, n: Size) -> Self {
        self.steps = Some(n);
        self
    }

    /// Space-step exponent offset `δ`.
    pub fn with_delta(mut self, delta: Real) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Terminal space-step power `pn`.
    pub fn with_terminal_power(mut self, pn: Real) -> Self {
        self.terminal_power = Some(pn);
        self
    }

    /// Space-scale factor `γ`.
    pub fn with_gamma(mut self, gamma: Real) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Quadrature rule.
    pub fn with_integration_scheme(mut self, scheme: IntegrationScheme) -> Self {
        self.integration_scheme = Some(scheme);
        self
    }

    /// Transition layout.
    pub fn with_transition_scheme(mut self, scheme: TransitionScheme) -> Self {
        self.transition_scheme = Some(scheme);
        self
    }

    /// Override [`DEFAULT_CLIP_TOLERANCE`].
    pub fn with_clip_tolerance(mut self, tolerance: Real) -> Self {
        self.clip_tolerance = Some(tolerance);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<SolverConfig> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| Error::Configuration(format!("missing required field '{name}'")))
        }

        let config = SolverConfig {
            x0: required(self.x0, "x0")?,
            horizon: required(self.horizon, "horizon")?,
            drift: required(self.drift, "drift")?,
            diffusion: required(self.diffusion, "diffusion")?,
            potential: required(self.potential, "potential")?,
            target: required(self.target, "target")?,
            bridge_mode: required(self.bridge_mode, "bridge_mode")?,
            one_sided: required(self.one_sided, "one_sided")?,
            steps: required(self.steps, "steps")?,
            delta: required(self.delta, "delta")?,
            terminal_power: required(self.terminal_power, "terminal_power")?,
            gamma: required(self.gamma, "gamma")?,
            integration_scheme: required(self.integration_scheme, "integration_scheme")?,
            transition_scheme: required(self.transition_scheme, "transition_scheme")?,
            clip_tolerance: self.clip_tolerance.unwrap_or(DEFAULT_CLIP_TOLERANCE),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn brownian() -> SolverConfigBuilder {
        SolverConfig::builder()
            .with_x0(0.0)
            .with_horizon(1.0)
            .with_drift(|_, _| 0.0)
            .with_diffusion(|_, _| 1.0)
            .with_potential(Potential::zero())
            .with_target(TargetSet::Everywhere)
            .with_bridge_mode(BridgeMode::PiecewiseLinear)
            .one_sided(false)
            .with_steps(16)
            .with_delta(0.25)
            .with_terminal_power(1.0)
            .with_gamma(1.0)
            .with_integration_scheme(IntegrationScheme::Trapezoidal)
            .with_transition_scheme(TransitionScheme::Gaussian)
    }

    #[test]
    fn complete_builder_succeeds() {
        let cfg = brownian().build().unwrap();
        assert_eq!(cfg.steps(), 16);
        assert_abs_diff_eq!(cfg.dt(), 1.0 / 16.0, epsilon = 1e-15);
        assert_abs_diff_eq!(cfg.clip_tolerance(), DEFAULT_CLIP_TOLERANCE, epsilon = 0.0);
        assert_abs_diff_eq!(cfg.diffusion(0.3, -2.0), 1.0, epsilon = 0.0);
    }

    #[test]
    fn missing_field_is_named() {
        let err = SolverConfig::builder()
            .with_x0(0.0)
            .with_horizon(1.0)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::Configuration("missing required field 'drift'".into())
        );
    }

    #[test]
    fn transition_scheme_is_required() {
        let mut builder = brownian();
        builder.transition_scheme = None;
        assert_eq!(
            builder.build().unwrap_err(),
            Error::Configuration("missing required field 'transition_scheme'".into())
        );
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            brownian().with_steps(0).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            brownian().with_horizon(0.0).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            brownian().with_gamma(-1.0).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            brownian()
                .with_target(TargetSet::Interval { lower: 1.0, upper: 0.5 })
                .build(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn space_step_switches_power_on_terminal_level() {
        let cfg = brownian().build().unwrap();
        let dt: Real = 1.0 / 16.0;
        assert_abs_diff_eq!(cfg.space_step(0), dt.powf(0.75), epsilon = 1e-15);
        assert_abs_diff_eq!(cfg.space_step(15), dt.powf(0.75), epsilon = 1e-15);
        assert_abs_diff_eq!(cfg.space_step(16), dt, epsilon = 1e-15);
    }

    #[test]
    fn tags_parse() {
        assert_eq!("piecewise-linear".parse::<BridgeMode>(), Ok(BridgeMode::PiecewiseLinear));
        assert_eq!("Gaussian".parse::<TransitionScheme>(), Ok(TransitionScheme::Gaussian));
        assert!("brownian-meander".parse::<BridgeMode>().is_err());
    }

    #[test]
    fn target_indicator() {
        let target = TargetSet::Interval { lower: -0.5, upper: 0.5 };
        assert_eq!(target.indicator(0.5), 1.0);
        assert_eq!(target.indicator(0.51), 0.0);
        assert_eq!(TargetSet::Everywhere.indicator(1e9), 1.0);
    }

    #[test]
    fn complex_potential_evaluates() {
        let v = Potential::complex(|_, x| Amplitude::new(0.0, x * x));
        assert!(!v.is_real());
        assert_eq!(v.value(0.0, 2.0), Amplitude::new(0.0, 4.0));
        assert!(Potential::zero().is_real());
    }
}
