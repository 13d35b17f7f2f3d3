/// models/forecast.rs — Mean-reverting variance projection
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Anchor:        V₀(t) = σ²_t from the recursion with ω = V_L · γ
///   Persistence:   φ = α + β,   decay rate  a = −ln φ   (0 < φ < 1 ⇒ a > 0)
///
///   Term average (default, Hull):
///       V(h) = V_L + (1 − e^{−a·h}) / (a·h) · (V₀ − V_L),     V(0) = V₀
///
///   Point forecast:
///       V(h) = V_L + e^{−a·h} · (V₀ − V_L)
///
///   Both satisfy  V(0) = V₀  and  V(h) → V_L  as h → ∞.
///
///   Reference (weight grows with h):
///       V(h) = V_L + (1 − e^{−a·h}) · (V₀ − V_L),            V(0) = V_L
///
///   The reference form moves away from V_L as h grows and tends to V₀ as
///   h → ∞, the reverse of the two limits above.  It is kept so published
///   figures built on it can be reproduced; it is never the default.
///
///   Output:  σ_ann(t) = √(252 · V(h))  for every defined anchor t ≥ 1.
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{GarchError, Result};
use crate::models::estimator::GarchFit;
use crate::models::garch::{recurse, GarchParams};
use crate::models::{annualize_variance, TRADING_PERIODS_PER_YEAR};

/// How the variance path over the horizon is summarised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastMode {
    /// Average expected variance over periods 1..=h: the volatility of an
    /// h-period holding window.
    #[default]
    TermAverage,
    /// Expected variance of period h alone.
    Point,
    /// V_L + (1 − e^{−a·h})(V₀ − V_L).  Starts at V_L and tends to V₀.
    Reference,
}

/// One annualised forecast per defined conditional variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityForecast {
    pub horizon: usize,
    pub mode: ForecastMode,
    /// a = −ln(α + β)
    pub decay_rate: f64,
    pub long_run_variance: f64,
    /// 252 · V(h), aligned with `returns[1..]`
    pub annualized_variance: Vec<f64>,
    /// √(252 · V(h))
    pub volatility: Vec<f64>,
}

impl VolatilityForecast {
    /// Return index of `volatility[0]`.
    pub const FIRST_INDEX: usize = 1;

    /// Forecast made at return index `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(Self::FIRST_INDEX)
            .and_then(|k| self.volatility.get(k).copied())
    }

    pub fn len(&self) -> usize {
        self.volatility.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volatility.is_empty()
    }

    /// Forecast from the most recent anchor.
    pub fn latest(&self) -> Option<f64> {
        self.volatility.last().copied()
    }

    /// Volatility laid out on the return index (`None` at index 0).
    pub fn aligned(&self) -> Vec<Option<f64>> {
        std::iter::once(None)
            .chain(self.volatility.iter().map(|&v| Some(v)))
            .collect()
    }

    /// √(252 · V_L)
    pub fn long_run_volatility(&self) -> f64 {
        (TRADING_PERIODS_PER_YEAR * self.long_run_variance).sqrt()
    }
}

/// Projects fitted GARCH(1,1) variance toward its long-run level.
///
/// The fitted (V_L, γ, α, β) passed in are the only inputs; nothing is
/// remembered from earlier fits or projections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastProjector {
    long_run_variance: f64,
    gamma: f64,
    alpha: f64,
    beta: f64,
    decay_rate: f64,
    mode: ForecastMode,
}

impl ForecastProjector {
    pub fn new(long_run_variance: f64, gamma: f64, alpha: f64, beta: f64) -> Result<Self> {
        let persistence = alpha + beta;
        if !(persistence > 0.0 && persistence < 1.0) {
            return Err(GarchError::DegeneratePersistence { persistence });
        }
        if !(long_run_variance > 0.0 && long_run_variance.is_finite()) {
            return Err(GarchError::InvalidParameter(format!(
                "long-run variance must be positive and finite, got {long_run_variance}"
            )));
        }
        if !(gamma > 0.0 && gamma < 1.0) {
            return Err(GarchError::InvalidParameter(format!(
                "γ must lie in (0, 1), got {gamma}"
            )));
        }
        Ok(Self {
            long_run_variance,
            gamma,
            alpha,
            beta,
            decay_rate: -persistence.ln(),
            mode: ForecastMode::default(),
        })
    }

    pub fn from_fit(fit: &GarchFit) -> Result<Self> {
        Self::new(fit.long_run_variance, fit.gamma, fit.params.alpha, fit.params.beta)
    }

    pub fn with_mode(mut self, mode: ForecastMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ForecastMode {
        self.mode
    }

    /// ω = V_L · γ
    pub fn omega(&self) -> f64 {
        self.long_run_variance * self.gamma
    }

    pub fn params(&self) -> GarchParams {
        GarchParams::from_long_run(self.long_run_variance, self.gamma, self.alpha, self.beta)
    }

    /// a = −ln(α + β)
    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    /// Weight left on the current deviation V₀ − V_L after `horizon` periods.
    fn weight(&self, horizon: usize) -> f64 {
        let ah = self.decay_rate * horizon as f64;
        match self.mode {
            ForecastMode::TermAverage | ForecastMode::Point if horizon == 0 => 1.0,
            // −expm1(−x)/x keeps full precision when a·h is tiny
            ForecastMode::TermAverage => -(-ah).exp_m1() / ah,
            ForecastMode::Point => (-ah).exp(),
            ForecastMode::Reference => -(-ah).exp_m1(),
        }
    }

    /// Per-period expected variance `horizon` periods after `current`.
    pub fn variance_at(&self, current: f64, horizon: usize) -> f64 {
        self.long_run_variance + self.weight(horizon) * (current - self.long_run_variance)
    }

    /// Annualised volatility forecast anchored at every defined variance of
    /// `returns`.
    pub fn project(&self, horizon: usize, returns: &[f64]) -> Result<VolatilityForecast> {
        let anchors = recurse(&self.params(), returns)?;
        let annualized_variance: Vec<f64> = anchors
            .values()
            .iter()
            .map(|&v0| annualize_variance(self.variance_at(v0, horizon)))
            .collect();
        let volatility = annualized_variance.iter().map(|v| v.sqrt()).collect();

        Ok(VolatilityForecast {
            horizon,
            mode: self.mode,
            decay_rate: self.decay_rate,
            long_run_variance: self.long_run_variance,
            annualized_variance,
            volatility,
        })
    }
}

/// Project(V_L, γ, α, β, horizon, returns) with the default term-average mode.
pub fn project(
    long_run_variance: f64,
    gamma: f64,
    alpha: f64,
    beta: f64,
    horizon: usize,
    returns: &[f64],
) -> Result<VolatilityForecast> {
    ForecastProjector::new(long_run_variance, gamma, alpha, beta)?.project(horizon, returns)
}
