/// models/garch.rs — GARCH(1,1) conditional variance and likelihood
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// GARCH(1,1): Bollerslev (1986), zero-mean log returns r_t.
///
///   Seed (first defined estimate):
///       σ²_1 = r²_0
///
///   Conditional variance update (t ≥ 2):
///       σ²_t = ω  +  α · r²_{t-1}  +  β · σ²_{t-1}
///
///   σ²_0 is undefined: no lagged return exists for period 0.
///
///   Constraints (covariance stationarity):
///     ω > 0,  α ≥ 0,  β ≥ 0,  α + β < 1
///
///   Persistence complement and long-run (unconditional) variance:
///       γ   = 1 − α − β
///       V_L = ω / γ
///
///   Objective minimised by the estimator (t ≥ 1):
///       L = −Σ_t [ −ln σ²_t − r²_t / σ²_t ]
///
/// UNDERFLOW NOTE
///   σ²_t sits inside ln(·) and in a denominator.  With ω ≥ 1e-7 the
///   recursion is bounded away from zero for every t ≥ 2, but σ²_1 = r²_0 is
///   exactly zero when the first return is zero.  The likelihood therefore
///   rejects any σ²_t ≤ 0 with `GarchError::DomainViolation` instead of
///   letting −ln 0 or 0/0 leak into a sum.
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{GarchError, Result};
use crate::models::MIN_RETURNS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    /// ω: intercept of the variance recursion
    pub omega: f64,
    /// α: ARCH (shock) coefficient
    pub alpha: f64,
    /// β: GARCH (persistence) coefficient
    pub beta: f64,
}

impl GarchParams {
    pub const fn new(omega: f64, alpha: f64, beta: f64) -> Self {
        Self { omega, alpha, beta }
    }

    /// Rebuild ω from a long-run variance and its persistence complement,
    /// ω = V_L · γ.
    pub fn from_long_run(long_run_variance: f64, gamma: f64, alpha: f64, beta: f64) -> Self {
        Self::new(long_run_variance * gamma, alpha, beta)
    }

    /// α + β
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// γ = 1 − α − β
    pub fn gamma(&self) -> f64 {
        1.0 - self.alpha - self.beta
    }

    pub fn is_stationary(&self) -> bool {
        self.omega > 0.0 && self.alpha >= 0.0 && self.beta >= 0.0 && self.gamma() > 0.0
    }

    /// V_L = ω / γ.  Undefined unless 0 < α + β < 1.
    pub fn long_run_variance(&self) -> Result<f64> {
        let persistence = self.persistence();
        if !(persistence > 0.0 && persistence < 1.0) {
            return Err(GarchError::DegeneratePersistence { persistence });
        }
        Ok(self.omega / self.gamma())
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.omega, self.alpha, self.beta]
    }
}

/// Where the recursion stands after the returns fed so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecursionState {
    /// No return seen; no variance defined.
    Uninitialized,
    /// One return seen; the variance is the raw seed r²_0.
    Seeded { variance: f64 },
    /// Two or more returns seen; the variance follows the GARCH update.
    Steady { variance: f64 },
}

/// Incremental GARCH(1,1) recursion.
///
/// Feeding r_{t-1} yields σ²_t, the variance estimate for the *next* period.
/// The seed/steady split lives in [`RecursionState`] so callers never do
/// index arithmetic around the burn-in.
#[derive(Debug, Clone)]
pub struct VarianceFilter {
    params: GarchParams,
    state: RecursionState,
}

impl VarianceFilter {
    pub fn new(params: GarchParams) -> Self {
        Self {
            params,
            state: RecursionState::Uninitialized,
        }
    }

    /// Feed one return and return the variance for the following period.
    pub fn update(&mut self, r: f64) -> f64 {
        let GarchParams { omega, alpha, beta } = self.params;
        let (next, state) = match self.state {
            RecursionState::Uninitialized => {
                let seed = r * r;
                (seed, RecursionState::Seeded { variance: seed })
            }
            RecursionState::Seeded { variance } | RecursionState::Steady { variance } => {
                let v = omega + alpha * r * r + beta * variance;
                (v, RecursionState::Steady { variance: v })
            }
        };
        self.state = state;
        next
    }

    /// Latest variance, `None` before the first return.
    pub fn variance(&self) -> Option<f64> {
        match self.state {
            RecursionState::Uninitialized => None,
            RecursionState::Seeded { variance } | RecursionState::Steady { variance } => {
                Some(variance)
            }
        }
    }

    pub fn state(&self) -> RecursionState {
        self.state
    }

    pub fn params(&self) -> &GarchParams {
        &self.params
    }
}

/// Conditional variance series aligned with the returns it was built from.
///
/// Entry `i` is σ²_i for `i` in `1..returns.len()`; index 0 is never defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalVariance {
    values: Vec<f64>,
}

impl ConditionalVariance {
    /// First index of the source return series that carries a variance.
    pub const FIRST_INDEX: usize = 1;

    /// σ²_index, `None` for index 0 or past the end.
    pub fn get(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(Self::FIRST_INDEX)
            .and_then(|k| self.values.get(k).copied())
    }

    /// σ²_1, σ²_2, … in order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Variance of the last period of the source series.
    pub fn current(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// `(return index, σ²)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(k, &v)| (k + Self::FIRST_INDEX, v))
    }
}

/// Reject series the recursion cannot use: too short or containing NaN/∞.
pub(crate) fn validate_returns(returns: &[f64]) -> Result<()> {
    if returns.len() < MIN_RETURNS {
        return Err(GarchError::InsufficientData {
            required: MIN_RETURNS,
            actual: returns.len(),
        });
    }
    if let Some((index, &value)) = returns.iter().enumerate().find(|(_, r)| !r.is_finite()) {
        return Err(GarchError::NonFiniteReturn { index, value });
    }
    Ok(())
}

/// Full conditional variance series implied by `params` over `returns`.
pub fn recurse(params: &GarchParams, returns: &[f64]) -> Result<ConditionalVariance> {
    validate_returns(returns)?;
    let mut filter = VarianceFilter::new(*params);
    // The last return would only produce σ²_n, which lies beyond the series.
    let values = returns[..returns.len() - 1]
        .iter()
        .map(|&r| filter.update(r))
        .collect();
    Ok(ConditionalVariance { values })
}

/// L = −Σ_{t≥1} [ −ln σ²_t − r²_t / σ²_t ]; smaller is a better fit.
///
/// No clamping happens here: any σ²_t ≤ 0 is reported as a
/// `DomainViolation` at that index.
pub fn neg_log_likelihood(params: &GarchParams, returns: &[f64]) -> Result<f64> {
    validate_returns(returns)?;
    let mut filter = VarianceFilter::new(*params);
    let mut log_likelihood = 0.0;
    for t in 1..returns.len() {
        let variance = filter.update(returns[t - 1]);
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(GarchError::DomainViolation { index: t, variance });
        }
        let r = returns[t];
        log_likelihood += -variance.ln() - r * r / variance;
    }
    let nll = -log_likelihood;
    if !nll.is_finite() {
        return Err(GarchError::NumericalFailure(format!(
            "negative log-likelihood overflowed for ω={:e} α={} β={}",
            params.omega, params.alpha, params.beta
        )));
    }
    Ok(nll)
}
