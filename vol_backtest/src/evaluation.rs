/// evaluation.rs — Out-of-sample scoring of volatility forecasts
///
/// For a forecast horizon h:
///
///   label[i]   = realized σ over returns i+1 ..= i+h          (future_volatility)
///   sample     = every return index whose label exists         (0 .. n−h)
///   split      = first (1 − test_fraction) of the sample → train, rest → test
///
///   GARCH:     fit (ω, α, β) on train returns only, project over the whole
///              series (the forecast at i uses returns < i), score R² on the
///              train and test index ranges separately.
///   Baselines: trailing realized estimators with window h, scored over the
///              whole sample and over the test range.
///
/// The split is chronological: the variance recursion needs contiguous
/// history, and shuffling would leak future returns into the fit.
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use garch_engine::metrics::{aligned_pairs, score, ForecastScore};
use garch_engine::models::MIN_RETURNS;
use garch_engine::realized::future_volatility;
use garch_engine::{
    EstimatorConfig, ForecastMode, ForecastProjector, GarchEstimator, GarchFit, PriceSeries,
    RealizedEstimator,
};

/// Horizons scored by a default sweep: 5, 10, …, 245.
pub fn default_horizons() -> Vec<usize> {
    (5..250).step_by(5).collect()
}

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Share of the labelled sample held out at its end
    pub test_fraction: f64,
    pub estimator: EstimatorConfig,
    pub mode: ForecastMode,
    /// Treat an unconverged fit as an error
    pub require_convergence: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            estimator: EstimatorConfig::default(),
            mode: ForecastMode::default(),
            require_convergence: false,
        }
    }
}

/// Index ranges of a chronological train/test split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSplit {
    /// Train covers 0 .. test_start
    pub test_start: usize,
    /// Test covers test_start .. end
    pub end: usize,
}

impl SampleSplit {
    pub fn train_len(&self) -> usize {
        self.test_start
    }

    pub fn test_len(&self) -> usize {
        self.end - self.test_start
    }
}

/// Split `len` labelled returns, keeping at least `MIN_RETURNS` for training.
pub fn chronological_split(len: usize, test_fraction: f64) -> Result<SampleSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(anyhow!("test fraction must lie in (0, 1), got {test_fraction}"));
    }
    let test_len = (len as f64 * test_fraction).round() as usize;
    let test_start = len.saturating_sub(test_len);
    if test_start < MIN_RETURNS {
        return Err(anyhow!(
            "{len} labelled returns leave only {test_start} for training (need {MIN_RETURNS})"
        ));
    }
    Ok(SampleSplit { test_start, end: len })
}

/// Score over `range` of two return-indexed series; `None` when fewer than
/// two pairs are defined there.
fn score_range(
    label: &[Option<f64>],
    forecast: &[Option<f64>],
    range: std::ops::Range<usize>,
) -> Result<Option<ForecastScore>> {
    let (a, p) = aligned_pairs(&label[range.clone()], &forecast[range]);
    if a.len() < 2 {
        return Ok(None);
    }
    Ok(Some(score(&a, &p)?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarchEvaluation {
    pub horizon: usize,
    pub split: SampleSplit,
    pub fit: GarchFit,
    pub train: Option<ForecastScore>,
    pub test: Option<ForecastScore>,
    /// Forecast from the last return of the series
    pub latest_forecast: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineScore {
    pub estimator: RealizedEstimator,
    pub full: Option<ForecastScore>,
    pub test: Option<ForecastScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonReport {
    pub horizon: usize,
    pub garch: GarchEvaluation,
    pub baselines: Vec<BaselineScore>,
}

impl HorizonReport {
    pub fn baseline(&self, estimator: RealizedEstimator) -> Option<&BaselineScore> {
        self.baselines.iter().find(|b| b.estimator == estimator)
    }
}

fn labelled_sample(returns: &[f64], horizon: usize) -> Result<(Vec<Option<f64>>, usize)> {
    let label = future_volatility(returns, horizon)?;
    let len = returns.len().saturating_sub(horizon);
    if len == 0 {
        return Err(anyhow!(
            "horizon {horizon} leaves no labelled returns out of {}",
            returns.len()
        ));
    }
    Ok((label, len))
}

pub fn evaluate_garch(
    prices: &PriceSeries,
    horizon: usize,
    config: &EvaluationConfig,
) -> Result<GarchEvaluation> {
    let returns = prices.log_returns();
    let (label, len) = labelled_sample(&returns, horizon)?;
    let split = chronological_split(len, config.test_fraction)?;

    let estimator = GarchEstimator::new(config.estimator.clone())?;
    let fit = estimator.fit(&returns[..split.test_start])?;
    let fit = if config.require_convergence {
        fit.ensure_converged()?
    } else {
        fit
    };

    let forecast = ForecastProjector::from_fit(&fit)?
        .with_mode(config.mode)
        .project(horizon, &returns)?;
    let aligned = forecast.aligned();

    let train = score_range(&label, &aligned, 0..split.test_start)?;
    let test = score_range(&label, &aligned, split.test_start..split.end)?;
    if test.is_none() {
        warn!("h={horizon}: fewer than two labelled test points, test R² not reported");
    }

    Ok(GarchEvaluation {
        horizon,
        split,
        fit,
        train,
        test,
        latest_forecast: forecast.latest(),
    })
}

pub fn evaluate_baselines(
    prices: &PriceSeries,
    horizon: usize,
    test_fraction: f64,
) -> Result<Vec<BaselineScore>> {
    let bars = prices.return_bars();
    let returns: Vec<f64> = bars.iter().map(|b| b.log_return()).collect();
    let (label, len) = labelled_sample(&returns, horizon)?;
    let split = chronological_split(len, test_fraction)?;

    RealizedEstimator::ALL
        .iter()
        .map(|&estimator| -> Result<BaselineScore> {
            let series = estimator.series(&bars, horizon)?;
            Ok(BaselineScore {
                estimator,
                full: score_range(&label, &series, 0..split.end)?,
                test: score_range(&label, &series, split.test_start..split.end)?,
            })
        })
        .collect()
}

pub fn evaluate_horizon(
    prices: &PriceSeries,
    horizon: usize,
    config: &EvaluationConfig,
) -> Result<HorizonReport> {
    let garch = evaluate_garch(prices, horizon, config)?;
    let baselines = evaluate_baselines(prices, horizon, config.test_fraction)?;
    Ok(HorizonReport { horizon, garch, baselines })
}

/// Evaluate every horizon in parallel, one GARCH fit each.  Horizons that
/// cannot be evaluated are skipped with a warning; results keep the order of
/// `horizons`.
pub fn sweep(
    prices: &PriceSeries,
    horizons: &[usize],
    config: &EvaluationConfig,
) -> Result<Vec<HorizonReport>> {
    info!("Sweeping {} horizons over {} bars", horizons.len(), prices.len());
    let outcomes: Vec<(usize, Result<HorizonReport>)> = horizons
        .par_iter()
        .map(|&h| (h, evaluate_horizon(prices, h, config)))
        .collect();

    let mut reports = Vec::with_capacity(outcomes.len());
    for (h, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => warn!("h={h}: skipped ({e})"),
        }
    }
    if reports.is_empty() {
        return Err(anyhow!("no horizon could be evaluated"));
    }
    Ok(reports)
}
