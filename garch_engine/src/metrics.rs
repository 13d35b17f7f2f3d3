/// metrics.rs — Forecast accuracy metrics
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// COEFFICIENT OF DETERMINATION
///   Used for: ranking volatility forecasts against the realized label
///
///   ȳ      = mean(actual)
///   SS_res = Σ (y_t − ŷ_t)²
///   SS_tot = Σ (y_t − ȳ)²
///   R²     = 1 − SS_res / SS_tot
///
///   1 is a perfect forecast, 0 matches always predicting ȳ, and R² is
///   unbounded below.  Undefined when the label is constant (SS_tot = 0).
///
/// ERROR MAGNITUDES
///   RMSE = √(Σ (y_t − ŷ_t)² / n)
///   MAE  = Σ |y_t − ŷ_t| / n
///
/// ALIGNMENT
///   Series arrive on the return index with `None` where a value is not
///   defined (warm-up windows, look-ahead beyond the sample).  Only indices
///   where both sides are defined are scored.
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{GarchError, Result};

/// Accuracy of one forecast series against its label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastScore {
    pub r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Number of scored pairs
    pub n: usize,
}

impl std::fmt::Display for ForecastScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "R² {:>8.4}  RMSE {:>7.4}  MAE {:>7.4}  (n={})",
            self.r_squared, self.rmse, self.mae, self.n
        )
    }
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(GarchError::InvalidParameter(format!(
            "length mismatch: {} actual vs {} predicted",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(GarchError::InsufficientData { required: 1, actual: 0 });
    }
    Ok(())
}

pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let y_bar = mean(actual).unwrap_or(0.0);
    let ss_tot: f64 = actual.iter().map(|y| (y - y_bar).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err(GarchError::NumericalFailure(
            "R² undefined: actual series has zero variance".to_string(),
        ));
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    Ok(1.0 - ss_res / ss_tot)
}

pub fn score(actual: &[f64], predicted: &[f64]) -> Result<ForecastScore> {
    let r_squared = r_squared(actual, predicted)?;
    let errors: Vec<f64> = actual.iter().zip(predicted).map(|(y, p)| y - p).collect();
    let n = errors.len();
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n as f64).sqrt();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n as f64;
    Ok(ForecastScore { r_squared, rmse, mae, n })
}

/// Pairs where both series are defined.
pub fn aligned_pairs(actual: &[Option<f64>], predicted: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    actual
        .iter()
        .zip(predicted)
        .filter_map(|(a, p)| Some(((*a)?, (*p)?)))
        .unzip()
}

/// Score two return-indexed series over their common defined indices.
pub fn score_aligned(actual: &[Option<f64>], predicted: &[Option<f64>]) -> Result<ForecastScore> {
    if actual.len() != predicted.len() {
        return Err(GarchError::InvalidParameter(format!(
            "series not aligned: {} label values vs {} forecasts",
            actual.len(),
            predicted.len()
        )));
    }
    let (a, p) = aligned_pairs(actual, predicted);
    score(&a, &p)
}

// ── Statistical helpers ───────────────────────────────────────────────────

pub(crate) fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_forecast_scores_one() {
        let y = [0.1, 0.2, 0.3, 0.25];
        assert_eq!(r_squared(&y, &y).unwrap(), 1.0);
        let s = score(&y, &y).unwrap();
        assert_eq!((s.rmse, s.mae, s.n), (0.0, 0.0, 4));
    }

    #[test]
    fn mean_forecast_scores_zero() {
        let y = [1.0, 2.0, 3.0];
        let r2 = r_squared(&y, &[2.0, 2.0, 2.0]).unwrap();
        assert!(r2.abs() < 1e-12, "r2 = {r2}");
    }

    #[test]
    fn r_squared_hand_computed() {
        // ȳ = 2, SS_tot = 2, SS_res = 0.25 + 0 + 0.25 = 0.5 → R² = 0.75
        let r2 = r_squared(&[1.0, 2.0, 3.0], &[1.5, 2.0, 2.5]).unwrap();
        assert!((r2 - 0.75).abs() < 1e-12, "r2 = {r2}");
        let s = score(&[1.0, 2.0, 3.0], &[1.5, 2.0, 2.5]).unwrap();
        assert!((s.mae - 1.0 / 3.0).abs() < 1e-12);
        assert!((s.rmse - (0.5f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn r_squared_can_be_negative() {
        let r2 = r_squared(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r2 + 3.0).abs() < 1e-12, "r2 = {r2}");
    }

    #[test]
    fn degenerate_inputs_are_errors() {
        assert!(r_squared(&[1.0, 1.0], &[1.0, 2.0]).is_err());
        assert!(r_squared(&[1.0], &[1.0, 2.0]).is_err());
        assert!(matches!(r_squared(&[], &[]), Err(GarchError::InsufficientData { .. })));
    }

    #[test]
    fn aligned_scoring_skips_undefined_entries() {
        let actual = [None, Some(1.0), Some(2.0), Some(3.0), None];
        let predicted = [Some(9.0), Some(1.5), None, Some(2.5), Some(4.0)];
        let (a, p) = aligned_pairs(&actual, &predicted);
        assert_eq!(a, vec![1.0, 3.0]);
        assert_eq!(p, vec![1.5, 2.5]);
        let s = score_aligned(&actual, &predicted).unwrap();
        assert_eq!(s.n, 2);
        assert!(score_aligned(&actual, &predicted[..3]).is_err());
    }
}
