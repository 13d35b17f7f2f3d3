/// models/estimator.rs — Constrained maximum-likelihood fit of GARCH(1,1)
///
/// ─────────────────────────────────────────────────────────────────────────
/// PROBLEM
/// ─────────────────────────────────────────────────────────────────────────
///
///   minimise   L(ω, α, β) = −Σ_t [ −ln σ²_t − r²_t / σ²_t ]
///
///   subject to   1e-7 ≤ ω ≤ 0.1
///                0.01 ≤ α ≤ 0.4
///                0.7  ≤ β ≤ 0.99999
///                ω, α, β ≥ 0
///                1 − α − β > 0
///
///   start        ω₀ = 1e-4,  α₀ = 0.01,  β₀ = 0.9
///
/// The search runs on (ln ω, α, β): ω spans six decades while α and β live
/// on the unit interval, and the log axis puts all three on a comparable
/// scale for the simplex.  Bounds on ω map one-to-one onto ln ω.
///
/// Post-processing:  γ̂ = 1 − α̂ − β̂,   V̂_L = ω̂ / γ̂
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GarchError, Result};
use crate::models::annualized_volatility;
use crate::models::garch::{neg_log_likelihood, validate_returns, GarchParams};
use crate::optimizer::{
    nelder_mead, BoxConstraints, Inequality, NelderMeadOptions, TerminationReason,
};

/// Closed intervals for each parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub omega: (f64, f64),
    pub alpha: (f64, f64),
    pub beta: (f64, f64),
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            omega: (1e-7, 0.1),
            alpha: (0.01, 0.4),
            beta: (0.7, 0.99999),
        }
    }
}

impl ParameterBounds {
    pub fn contains(&self, p: &GarchParams) -> bool {
        let inside = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        inside(p.omega, self.omega) && inside(p.alpha, self.alpha) && inside(p.beta, self.beta)
    }

    fn search_box(&self) -> Result<BoxConstraints> {
        if !(self.omega.0 > 0.0) {
            return Err(GarchError::InvalidParameter(format!(
                "lower ω bound must be positive, got {}",
                self.omega.0
            )));
        }
        BoxConstraints::new(
            vec![self.omega.0.ln(), self.alpha.0, self.beta.0],
            vec![self.omega.1.ln(), self.alpha.1, self.beta.1],
        )
    }

    /// (ln ω, α, β) → parameters, with ω pinned inside its bounds so the
    /// exp/ln round trip cannot step outside them.
    fn decode(&self, x: &[f64]) -> GarchParams {
        GarchParams::new(x[0].exp().clamp(self.omega.0, self.omega.1), x[1], x[2])
    }

    fn encode(p: &GarchParams) -> Vec<f64> {
        vec![p.omega.ln(), p.alpha, p.beta]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Starting point of the local search
    pub initial: GarchParams,
    pub bounds: ParameterBounds,
    /// Cap on optimizer iterations
    pub max_iterations: usize,
    /// Relative tolerance on the simplex objective spread
    pub f_tolerance: f64,
    /// Tolerance on the bound-scaled simplex size
    pub x_tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let nm = NelderMeadOptions::default();
        Self {
            initial: GarchParams::new(1e-4, 0.01, 0.9),
            bounds: ParameterBounds::default(),
            max_iterations: 1000,
            f_tolerance: nm.f_tolerance,
            x_tolerance: nm.x_tolerance,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.bounds.contains(&self.initial) {
            return Err(GarchError::InvalidParameter(format!(
                "initial guess {:?} lies outside the bounds {:?}",
                self.initial, self.bounds
            )));
        }
        if !self.initial.is_stationary() {
            return Err(GarchError::InvalidParameter(format!(
                "initial guess violates stationarity: α+β = {}",
                self.initial.persistence()
            )));
        }
        if self.max_iterations == 0 {
            return Err(GarchError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.f_tolerance > 0.0 && self.x_tolerance > 0.0) {
            return Err(GarchError::InvalidParameter(
                "optimizer tolerances must be positive".to_string(),
            ));
        }
        self.bounds.search_box().map(|_| ())
    }
}

/// Solver report attached to every fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub converged: bool,
    pub reason: TerminationReason,
    pub iterations: usize,
    pub objective_evaluations: usize,
    /// Objective at the initial guess
    pub initial_objective: f64,
    /// Objective at the returned parameters
    pub final_objective: f64,
    /// min(ω, α, β): residual of the non-negativity constraint
    pub non_negativity_residual: f64,
    /// 1 − α − β: residual of the stationarity constraint
    pub stationarity_residual: f64,
    /// Parameters sitting on a bound ("omega", "alpha", "beta")
    pub active_bounds: Vec<String>,
}

/// Fitted model: (V_L, γ, α, β) plus the ω they imply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarchFit {
    pub params: GarchParams,
    /// V_L = ω / γ
    pub long_run_variance: f64,
    /// γ = 1 − α − β
    pub gamma: f64,
    /// Number of returns the fit used
    pub n_obs: usize,
    pub diagnostics: FitDiagnostics,
}

impl GarchFit {
    pub fn alpha(&self) -> f64 {
        self.params.alpha
    }

    pub fn beta(&self) -> f64 {
        self.params.beta
    }

    pub fn omega(&self) -> f64 {
        self.params.omega
    }

    /// (V_L, γ, α, β)
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.long_run_variance, self.gamma, self.params.alpha, self.params.beta)
    }

    /// √(252 · V_L)
    pub fn long_run_volatility(&self) -> f64 {
        annualized_volatility(self.long_run_variance)
    }

    pub fn converged(&self) -> bool {
        self.diagnostics.converged
    }

    /// Turn an unconverged fit into `GarchError::NotConverged`.
    pub fn ensure_converged(self) -> Result<Self> {
        if self.diagnostics.converged {
            Ok(self)
        } else {
            Err(GarchError::NotConverged {
                diagnostics: Box::new(self.diagnostics),
            })
        }
    }
}

impl std::fmt::Display for GarchFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = &self.diagnostics;
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  GARCH(1,1) — MAXIMUM LIKELIHOOD FIT")?;
        writeln!(f, "════════════════════════════════════════════")?;
        writeln!(f, "  Observations   : {}", self.n_obs)?;
        writeln!(f, "  ω (omega)      : {:.6e}", self.params.omega)?;
        writeln!(f, "  α (alpha)      : {:.6}", self.params.alpha)?;
        writeln!(f, "  β (beta)       : {:.6}", self.params.beta)?;
        writeln!(f, "  γ = 1 − α − β  : {:.6}", self.gamma)?;
        writeln!(f, "  V_L            : {:.6e}", self.long_run_variance)?;
        writeln!(f, "  Long-run σ     : {:.2}%", self.long_run_volatility() * 100.0)?;
        writeln!(f, "  −log L start   : {:.4}", d.initial_objective)?;
        writeln!(f, "  −log L final   : {:.4}", d.final_objective)?;
        writeln!(f, "  Converged      : {} ({:?})", d.converged, d.reason)?;
        writeln!(f, "  Iterations     : {} ({} evaluations)", d.iterations, d.objective_evaluations)?;
        if !d.active_bounds.is_empty() {
            writeln!(f, "  Active bounds  : {}", d.active_bounds.join(", "))?;
        }
        writeln!(f, "════════════════════════════════════════════")
    }
}

/// Fits GARCH(1,1) parameters with a single deterministic local search.
#[derive(Debug, Clone, Default)]
pub struct GarchEstimator {
    config: EstimatorConfig,
}

impl GarchEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn fit(&self, returns: &[f64]) -> Result<GarchFit> {
        validate_returns(returns)?;
        let bounds = &self.config.bounds;
        let search_box = bounds.search_box()?;

        let x0 = ParameterBounds::encode(&self.config.initial);
        let start = bounds.decode(&x0);
        // A zero first return (or similar) makes the likelihood undefined
        // everywhere; report that instead of searching.
        let initial_objective = neg_log_likelihood(&start, returns)?;

        let constraints = [
            Inequality::non_negative("non-negativity", |x: &[f64]| {
                bounds.decode(x).to_array().to_vec()
            }),
            Inequality::positive("stationarity", |x: &[f64]| vec![bounds.decode(x).gamma()]),
        ];
        let options = NelderMeadOptions {
            max_iterations: self.config.max_iterations,
            f_tolerance: self.config.f_tolerance,
            x_tolerance: self.config.x_tolerance,
            ..NelderMeadOptions::default()
        };

        let result = nelder_mead(&x0, &search_box, &constraints, options, |x| {
            neg_log_likelihood(&bounds.decode(x), returns).ok()
        })?;

        let params = bounds.decode(&result.x);
        let final_objective = neg_log_likelihood(&params, returns).map_err(|e| {
            GarchError::NumericalFailure(format!("objective undefined at the optimum: {e}"))
        })?;
        let gamma = params.gamma();
        if gamma <= 0.0 {
            return Err(GarchError::DegeneratePersistence {
                persistence: params.persistence(),
            });
        }
        let long_run_variance = params.omega / gamma;

        let names = ["omega", "alpha", "beta"];
        let active_bounds: Vec<String> = search_box
            .active(&result.x, 1e-9)
            .into_iter()
            .map(|i| names[i].to_string())
            .collect();

        let diagnostics = FitDiagnostics {
            converged: result.convergence.converged,
            reason: result.convergence.reason,
            iterations: result.convergence.iterations,
            objective_evaluations: result.convergence.objective_evaluations,
            initial_objective,
            final_objective,
            non_negativity_residual: params.omega.min(params.alpha).min(params.beta),
            stationarity_residual: gamma,
            active_bounds,
        };

        info!(
            "GARCH fit: n={} ω={:.3e} α={:.4} β={:.4} γ={:.4} V_L={:.3e} −logL {:.3} → {:.3}",
            returns.len(), params.omega, params.alpha, params.beta, gamma, long_run_variance,
            initial_objective, final_objective
        );
        if !diagnostics.converged {
            warn!(
                "GARCH optimizer stopped without converging after {} iterations ({:?})",
                diagnostics.iterations, diagnostics.reason
            );
        }
        if !diagnostics.active_bounds.is_empty() {
            warn!("GARCH fit on bound(s): {}", diagnostics.active_bounds.join(", "));
        }

        Ok(GarchFit {
            params,
            long_run_variance,
            gamma,
            n_obs: returns.len(),
            diagnostics,
        })
    }
}

/// Fit with the default configuration.
pub fn fit(returns: &[f64]) -> Result<GarchFit> {
    GarchEstimator::default().fit(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::simulate::simulate_returns;

    const TRUE_PARAMS: GarchParams = GarchParams::new(1e-5, 0.05, 0.90);

    #[test]
    fn default_config_is_valid_interior_point() {
        let cfg = EstimatorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.initial, GarchParams::new(1e-4, 0.01, 0.9));
        assert_eq!(cfg.max_iterations, 1000);
    }

    #[test]
    fn config_rejects_initial_guess_outside_bounds() {
        let cfg = EstimatorConfig {
            initial: GarchParams::new(1e-4, 0.5, 0.45),
            ..EstimatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(GarchError::InvalidParameter(_))));

        // β₀ = 0.65 is only admissible once the β bounds are widened.
        let widened = EstimatorConfig {
            initial: GarchParams::new(1e-4, 0.2, 0.65),
            bounds: ParameterBounds { beta: (0.6, 0.99), ..ParameterBounds::default() },
            ..EstimatorConfig::default()
        };
        widened.validate().unwrap();
        let narrow = EstimatorConfig { bounds: ParameterBounds::default(), ..widened };
        assert!(narrow.validate().is_err());

        let cfg = EstimatorConfig {
            initial: GarchParams::new(1e-4, 0.35, 0.7),
            ..EstimatorConfig::default()
        };
        // α + β = 1.05: inside the box but not stationary
        assert!(GarchEstimator::new(cfg).is_err());
    }

    #[test]
    fn fit_stays_inside_bounds_and_stationary() {
        let returns = simulate_returns(&TRUE_PARAMS, 800, 7).unwrap();
        let fit = fit(&returns).unwrap();

        assert!(ParameterBounds::default().contains(&fit.params), "{:?}", fit.params);
        assert!(fit.alpha() + fit.beta() < 1.0);
        assert!(fit.gamma > 0.0);
        assert!((fit.gamma - (1.0 - fit.alpha() - fit.beta())).abs() < 1e-15);
        assert!((fit.long_run_variance - fit.omega() / fit.gamma).abs() < 1e-18);
        assert_eq!(fit.n_obs, 800);
        assert!(fit.diagnostics.stationarity_residual > 0.0);
        assert!(fit.diagnostics.non_negativity_residual >= 0.0);
    }

    #[test]
    fn fit_never_worse_than_initial_guess() {
        for seed in [1, 2, 3] {
            let returns = simulate_returns(&TRUE_PARAMS, 400, seed).unwrap();
            let fit = fit(&returns).unwrap();
            let start = neg_log_likelihood(&GarchParams::new(1e-4, 0.01, 0.9), &returns).unwrap();
            let end = neg_log_likelihood(&fit.params, &returns).unwrap();
            assert!(end <= start, "seed {seed}: {end} > {start}");
            assert!(fit.diagnostics.final_objective <= fit.diagnostics.initial_objective);
        }
    }

    #[test]
    fn recovers_parameters_from_500_periods() {
        // 500 observations pin α down well; β trades off against ω along a
        // flat ridge, so its tolerance is wider.
        let returns = simulate_returns(&TRUE_PARAMS, 500, 42).unwrap();
        let fit = fit(&returns).unwrap();

        assert!((fit.alpha() - 0.05).abs() < 0.08, "α̂ = {}", fit.alpha());
        assert!((fit.beta() - 0.90).abs() < 0.15, "β̂ = {}", fit.beta());
        assert!(fit.gamma > 0.0);
    }

    #[test]
    fn recovers_parameters_on_long_sample() {
        let returns = simulate_returns(&TRUE_PARAMS, 4000, 2024).unwrap();
        let fit = fit(&returns).unwrap();

        assert!((fit.alpha() - 0.05).abs() < 0.04, "α̂ = {}", fit.alpha());
        assert!((fit.beta() - 0.90).abs() < 0.08, "β̂ = {}", fit.beta());
        assert!(fit.gamma > 0.0);
    }

    #[test]
    fn fit_is_deterministic() {
        let returns = simulate_returns(&TRUE_PARAMS, 300, 11).unwrap();
        let a = fit(&returns).unwrap();
        let b = fit(&returns).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_series_fails_fast() {
        let err = fit(&[0.0; 10]).unwrap_err();
        assert!(matches!(err, GarchError::DomainViolation { index: 1, .. }), "{err:?}");
    }

    #[test]
    fn too_few_returns_rejected() {
        assert!(matches!(
            fit(&[0.01, -0.02]),
            Err(GarchError::InsufficientData { .. })
        ));
    }

    #[test]
    fn unconverged_fit_is_reported_and_can_be_rejected() {
        let returns = simulate_returns(&TRUE_PARAMS, 300, 5).unwrap();
        let estimator = GarchEstimator::new(EstimatorConfig {
            max_iterations: 2,
            ..EstimatorConfig::default()
        })
        .unwrap();
        let fit = estimator.fit(&returns).unwrap();

        assert!(!fit.converged());
        assert_eq!(fit.diagnostics.reason, TerminationReason::MaxIterations);
        assert_eq!(fit.diagnostics.iterations, 2);
        assert!(ParameterBounds::default().contains(&fit.params));
        match fit.ensure_converged() {
            Err(GarchError::NotConverged { diagnostics }) => assert_eq!(diagnostics.iterations, 2),
            other => panic!("expected NotConverged, got {other:?}"),
        }
    }

    #[test]
    fn as_tuple_orders_long_run_first() {
        let returns = simulate_returns(&TRUE_PARAMS, 300, 9).unwrap();
        let fit = fit(&returns).unwrap();
        let (v_l, gamma, alpha, beta) = fit.as_tuple();
        assert_eq!(v_l, fit.long_run_variance);
        assert_eq!(gamma, fit.gamma);
        assert_eq!(alpha, fit.alpha());
        assert_eq!(beta, fit.beta());
        assert!(fit.to_string().contains("GARCH(1,1)"));
    }
}
