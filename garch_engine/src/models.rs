/// models.rs — GARCH(1,1) model family
///
/// ─────────────────────────────────────────────────────────────────────────
/// DATA FLOW
/// ─────────────────────────────────────────────────────────────────────────
///
///   log returns ──► GarchEstimator::fit ──► GarchFit (V_L, γ, α, β)
///                     │    ▲
///                     ▼    │  (repeatedly, per optimizer step)
///              neg_log_likelihood ──► VarianceFilter
///
///   GarchFit + horizon + returns ──► ForecastProjector ──► annualised σ series
///
/// Every stage is a pure function of its explicit inputs; nothing is cached
/// between calls.
/// ─────────────────────────────────────────────────────────────────────────
pub mod estimator;
pub mod forecast;
pub mod garch;
pub mod simulate;

pub use estimator::{fit, EstimatorConfig, FitDiagnostics, GarchEstimator, GarchFit, ParameterBounds};
pub use forecast::{project, ForecastMode, ForecastProjector, VolatilityForecast};
pub use garch::{neg_log_likelihood, recurse, ConditionalVariance, GarchParams, RecursionState, VarianceFilter};
pub use simulate::{prices_from_returns, simulate_returns, synthetic_bars};

/// Trading periods per year; every annualisation in the workspace uses it.
pub const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

/// Two returns are consumed by seeding and lagging before the first
/// forecastable variance exists.
pub const MIN_RETURNS: usize = 3;

/// Per-period variance → annual variance.
#[inline]
pub fn annualize_variance(variance: f64) -> f64 {
    TRADING_PERIODS_PER_YEAR * variance
}

/// Per-period variance → annual volatility, σ_annual = √(252 · σ²).
#[inline]
pub fn annualized_volatility(variance: f64) -> f64 {
    annualize_variance(variance).sqrt()
}
