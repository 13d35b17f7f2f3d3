/// realized.rs — Realized-volatility estimators (end-of-day data)
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// Window of N return-aligned bars, annualised with 252 periods/year.
///
///   Historical:        σ = √252 · stdev(r)                 (n − 1 divisor)
///
///   Close-to-close:    s² = N/(N−1) · Σ r² / N              (zero mean)
///                      b_N = √(2/(N−1)) · Γ(N/2) / Γ((N−1)/2)
///                      σ = √252 · s / b_N
///
///   Parkinson (1980):  σ = √(252 · Σ ln(H/L)² / (4 N ln 2))
///
///   Garman-Klass (1980):
///                      T1 = Σ ln(H/L)² / (2N)
///                      T2 = (2 ln 2 − 1) · Σ ln(C/C₋₁)² / N
///                      σ = √252 · √(T1 − T2),   0 when T2 > T1
///
///   Rogers-Satchell (1991):
///                      σ = √252 · √mean( ln(H/C)·ln(H/O) + ln(L/C)·ln(L/O) )
///
/// Rolling series are aligned with the return index: entry i covers returns
/// i−N+1 ..= i and is `None` until the window is full.
///
/// Future-volatility label (the forecasting target):
///     label_h[i] = historical σ over returns i+1 ..= i+h
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use tracing::{debug, warn};

use crate::data::ReturnBar;
use crate::error::{GarchError, Result};
use crate::models::TRADING_PERIODS_PER_YEAR;

fn require(actual: usize, required: usize) -> Result<()> {
    if actual < required {
        return Err(GarchError::InsufficientData { required, actual });
    }
    Ok(())
}

/// √252 · sample standard deviation of log returns.
pub fn historical(returns: &[f64]) -> Result<f64> {
    require(returns.len(), 2)?;
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok((TRADING_PERIODS_PER_YEAR * var).sqrt())
}

/// c4-style bias factor b_N for the standard deviation of N normal draws.
fn bias_factor(n: f64) -> f64 {
    (2.0 / (n - 1.0)).sqrt() * (ln_gamma(n / 2.0) - ln_gamma((n - 1.0) / 2.0)).exp()
}

/// Zero-mean close-to-close estimator with the b_N standard-deviation bias
/// correction.
pub fn close_to_close(returns: &[f64]) -> Result<f64> {
    require(returns.len(), 2)?;
    let n = returns.len() as f64;
    let sample_variance = returns.iter().map(|r| r * r).sum::<f64>() / n;
    let unbiased = n * sample_variance / (n - 1.0);
    Ok(TRADING_PERIODS_PER_YEAR.sqrt() * unbiased.sqrt() / bias_factor(n))
}

pub fn parkinson(bars: &[ReturnBar]) -> Result<f64> {
    require(bars.len(), 1)?;
    let n = bars.len() as f64;
    let sum_sq: f64 = bars.iter().map(|b| b.log_range().powi(2)).sum();
    Ok((TRADING_PERIODS_PER_YEAR * sum_sq / (4.0 * n * std::f64::consts::LN_2)).sqrt())
}

/// Garman-Klass volatility; windows where the close-to-close term dominates
/// the range term yield 0.
pub fn garman_klass(bars: &[ReturnBar]) -> Result<f64> {
    require(bars.len(), 1)?;
    let n = bars.len() as f64;
    let term1 = bars.iter().map(|b| b.log_range().powi(2)).sum::<f64>() / (2.0 * n);
    let term2 = (2.0 * std::f64::consts::LN_2 - 1.0)
        * bars.iter().map(|b| b.log_return().powi(2)).sum::<f64>()
        / n;
    if term2 > term1 {
        debug!("Garman-Klass window clamped: term2 {term2:.3e} > term1 {term1:.3e}");
        return Ok(0.0);
    }
    Ok(TRADING_PERIODS_PER_YEAR.sqrt() * (term1 - term2).sqrt())
}

pub fn rogers_satchell(bars: &[ReturnBar]) -> Result<f64> {
    require(bars.len(), 1)?;
    let n = bars.len() as f64;
    let mean = bars
        .iter()
        .map(|b| {
            (b.high / b.close).ln() * (b.high / b.open).ln()
                + (b.low / b.close).ln() * (b.low / b.open).ln()
        })
        .sum::<f64>()
        / n;
    // Negative only when a bar's close or open lies outside its own range.
    Ok(TRADING_PERIODS_PER_YEAR.sqrt() * mean.max(0.0).sqrt())
}

/// Apply `f` to every full trailing window of `items`.
pub fn rolling<T, F>(items: &[T], window: usize, f: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(&[T]) -> Result<f64>,
{
    if window == 0 {
        return Err(GarchError::InvalidParameter("window must be positive".to_string()));
    }
    let mut out = vec![None; items.len()];
    for end in window..=items.len() {
        out[end - 1] = Some(f(&items[end - window..end])?);
    }
    Ok(out)
}

/// Realized volatility of the next `horizon` returns, on the return index.
pub fn future_volatility(returns: &[f64], horizon: usize) -> Result<Vec<Option<f64>>> {
    if horizon < 2 {
        return Err(GarchError::InvalidParameter(format!(
            "future volatility needs a horizon of at least 2 periods, got {horizon}"
        )));
    }
    let n = returns.len();
    let mut out = vec![None; n];
    for (i, slot) in out.iter_mut().enumerate() {
        if i + horizon >= n {
            break;
        }
        *slot = Some(historical(&returns[i + 1..=i + horizon])?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealizedEstimator {
    Historical,
    CloseToClose,
    Parkinson,
    GarmanKlass,
    RogersSatchell,
}

impl RealizedEstimator {
    pub const ALL: [RealizedEstimator; 5] = [
        RealizedEstimator::Historical,
        RealizedEstimator::CloseToClose,
        RealizedEstimator::Parkinson,
        RealizedEstimator::GarmanKlass,
        RealizedEstimator::RogersSatchell,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RealizedEstimator::Historical => "historical",
            RealizedEstimator::CloseToClose => "close_to_close",
            RealizedEstimator::Parkinson => "parkinson",
            RealizedEstimator::GarmanKlass => "garman_klass",
            RealizedEstimator::RogersSatchell => "rogers_satchell",
        }
    }

    /// Smallest window the estimator is defined on.
    pub fn min_window(&self) -> usize {
        match self {
            RealizedEstimator::Historical | RealizedEstimator::CloseToClose => 2,
            _ => 1,
        }
    }

    pub fn estimate(&self, bars: &[ReturnBar]) -> Result<f64> {
        match self {
            RealizedEstimator::Historical => {
                historical(&bars.iter().map(ReturnBar::log_return).collect::<Vec<_>>())
            }
            RealizedEstimator::CloseToClose => {
                close_to_close(&bars.iter().map(ReturnBar::log_return).collect::<Vec<_>>())
            }
            RealizedEstimator::Parkinson => parkinson(bars),
            RealizedEstimator::GarmanKlass => garman_klass(bars),
            RealizedEstimator::RogersSatchell => rogers_satchell(bars),
        }
    }

    /// Trailing-window series over return-aligned bars.
    pub fn series(&self, bars: &[ReturnBar], window: usize) -> Result<Vec<Option<f64>>> {
        if window < self.min_window() {
            return Err(GarchError::InvalidParameter(format!(
                "{} needs a window of at least {}, got {window}",
                self.name(),
                self.min_window()
            )));
        }
        let out = rolling(bars, window, |w| self.estimate(w))?;
        if *self == RealizedEstimator::GarmanKlass {
            let clamped = out.iter().filter(|v| **v == Some(0.0)).count();
            if clamped > 0 {
                warn!("Garman-Klass: {clamped} window(s) of {window} clamped to zero");
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for RealizedEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(open: f64, high: f64, low: f64, close: f64, prev_close: f64) -> ReturnBar {
        ReturnBar { open, high, low, close, prev_close }
    }

    fn bars() -> Vec<ReturnBar> {
        vec![
            bar(100.0, 102.0, 99.0, 101.0, 100.0),
            bar(101.0, 103.5, 100.5, 103.0, 101.0),
            bar(103.0, 103.2, 100.0, 100.8, 103.0),
            bar(100.8, 101.9, 99.5, 101.5, 100.8),
        ]
    }

    #[test]
    fn historical_matches_hand_computation() {
        let r = [0.01, -0.02, 0.03];
        // mean 0.00667, deviations² sum = 0.00126667, / 2 = 0.00063333
        let expected = (252.0 * 0.0012666666666666666 / 2.0f64).sqrt();
        assert_relative_eq!(historical(&r).unwrap(), expected, max_relative = 1e-12);
        assert!(historical(&[0.01]).is_err());
    }

    #[test]
    fn bias_factor_known_values() {
        // b_2 = √2 · Γ(1)/Γ(1/2) = √(2/π)
        assert_relative_eq!(bias_factor(2.0), (2.0 / std::f64::consts::PI).sqrt(), max_relative = 1e-12);
        // b_N → 1 for large N
        assert!((bias_factor(1000.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn close_to_close_is_corrected_zero_mean_estimate() {
        let r = [0.01, -0.02, 0.03, 0.005];
        let n = 4.0;
        let raw = (r.iter().map(|x| x * x).sum::<f64>() / (n - 1.0)).sqrt();
        let expected = 252f64.sqrt() * raw / bias_factor(n);
        assert_relative_eq!(close_to_close(&r).unwrap(), expected, max_relative = 1e-12);
        assert!(close_to_close(&r).unwrap() > 252f64.sqrt() * raw);
    }

    #[test]
    fn parkinson_of_constant_range() {
        let b = vec![bar(1.0, 1.1, 1.0, 1.05, 1.0); 10];
        let expected = (252.0 * 1.1f64.ln().powi(2) / (4.0 * std::f64::consts::LN_2)).sqrt();
        assert_relative_eq!(parkinson(&b).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn garman_klass_clamps_to_zero() {
        // Zero intraday range but a large close-to-close move.
        let b = vec![bar(1.1, 1.1, 1.1, 1.1, 1.0); 3];
        assert_eq!(garman_klass(&b).unwrap(), 0.0);
        let gk = garman_klass(&bars()).unwrap();
        assert!(gk > 0.0 && gk.is_finite());
    }

    #[test]
    fn rogers_satchell_zero_for_flat_bars() {
        let b = vec![bar(1.0, 1.0, 1.0, 1.0, 1.0); 4];
        assert_eq!(rogers_satchell(&b).unwrap(), 0.0);
        assert!(rogers_satchell(&bars()).unwrap() > 0.0);
    }

    #[test]
    fn rolling_aligns_to_window_end() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let out = rolling(&x, 3, |w| Ok(w.iter().sum())).unwrap();
        assert_eq!(out, vec![None, None, Some(6.0), Some(9.0)]);
        assert!(rolling(&x, 0, |_| Ok(0.0)).is_err());
        assert_eq!(rolling(&x, 5, |_| Ok(0.0)).unwrap(), vec![None; 4]);
    }

    #[test]
    fn future_volatility_looks_ahead() {
        let r = [0.01, -0.02, 0.03, 0.005, -0.01, 0.02];
        let label = future_volatility(&r, 3).unwrap();
        assert_eq!(label.len(), r.len());
        assert_relative_eq!(label[0].unwrap(), historical(&r[1..4]).unwrap());
        assert_relative_eq!(label[2].unwrap(), historical(&r[3..6]).unwrap());
        assert_eq!(&label[3..], &[None, None, None]);
        assert!(future_volatility(&r, 1).is_err());
    }

    #[test]
    fn estimator_series_use_trailing_windows() {
        let b = bars();
        for est in RealizedEstimator::ALL {
            let s = est.series(&b, 2).unwrap();
            assert_eq!(s.len(), b.len());
            assert_eq!(s[0], None);
            assert_eq!(s[3], Some(est.estimate(&b[2..4]).unwrap()));
        }
        assert!(RealizedEstimator::Historical.series(&b, 1).is_err());
        assert_eq!(RealizedEstimator::GarmanKlass.to_string(), "garman_klass");
    }

    #[test]
    fn historical_estimator_uses_bar_returns() {
        let b = bars();
        let r: Vec<f64> = b.iter().map(ReturnBar::log_return).collect();
        assert_eq!(
            RealizedEstimator::Historical.estimate(&b).unwrap(),
            historical(&r).unwrap()
        );
    }
}
