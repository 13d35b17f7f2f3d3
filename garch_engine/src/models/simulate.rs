/// models/simulate.rs — Synthetic GARCH(1,1) paths
///
///   σ²_0 = V_L
///   r_t  = σ_t · z_t,            z_t ~ N(0, 1)
///   σ²_{t+1} = ω + α·r²_t + β·σ²_t
///
/// Deterministic per seed (StdRng), used by tests and the `simulate` command.
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::data::{PriceBar, PriceSeries};
use crate::error::{GarchError, Result};
use crate::models::garch::GarchParams;

fn check_params(params: &GarchParams) -> Result<f64> {
    if !(params.omega > 0.0 && params.alpha >= 0.0 && params.beta >= 0.0) {
        return Err(GarchError::InvalidParameter(format!(
            "simulation needs ω > 0 and α, β ≥ 0, got {params:?}"
        )));
    }
    params.long_run_variance()
}

/// Draw `n` log returns from a GARCH(1,1) process started at its long-run
/// variance.
pub fn simulate_returns(params: &GarchParams, n: usize, seed: u64) -> Result<Vec<f64>> {
    let mut variance = check_params(params)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut returns = Vec::with_capacity(n);
    for _ in 0..n {
        let z: f64 = rng.sample(StandardNormal);
        let r = variance.sqrt() * z;
        returns.push(r);
        variance = params.omega + params.alpha * r * r + params.beta * variance;
    }
    Ok(returns)
}

/// Compound log returns onto `start`; the result has one more element than
/// `returns`.
pub fn prices_from_returns(start: f64, returns: &[f64]) -> Vec<f64> {
    let mut prices = Vec::with_capacity(returns.len() + 1);
    prices.push(start);
    let mut p = start;
    for r in returns {
        p *= r.exp();
        prices.push(p);
    }
    prices
}

fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut d = date + Duration::days(1);
    while matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
        d += Duration::days(1);
    }
    d
}

/// OHLC bars over business days whose closes follow a simulated GARCH(1,1)
/// path. Intraday extremes are drawn around the open/close range with the
/// same conditional scale, so range-based estimators see the same regime.
pub fn synthetic_bars(
    params: &GarchParams,
    n: usize,
    seed: u64,
    start_price: f64,
    start_date: NaiveDate,
) -> Result<PriceSeries> {
    if !(start_price > 0.0 && start_price.is_finite()) {
        return Err(GarchError::InvalidParameter(format!(
            "start price must be positive, got {start_price}"
        )));
    }
    let mut variance = check_params(params)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut bars = Vec::with_capacity(n + 1);
    let mut date = start_date;
    bars.push(PriceBar::new(Some(date), start_price, start_price, start_price, start_price));
    let mut close = start_price;

    for _ in 0..n {
        let sigma = variance.sqrt();
        let z: f64 = rng.sample(StandardNormal);
        let r = sigma * z;
        let open = close;
        close = open * r.exp();

        let up: f64 = rng.sample::<f64, _>(StandardNormal).abs();
        let down: f64 = rng.sample::<f64, _>(StandardNormal).abs();
        let high = open.max(close) * (0.5 * sigma * up).exp();
        let low = open.min(close) * (-0.5 * sigma * down).exp();

        date = next_business_day(date);
        bars.push(PriceBar::new(Some(date), open, high, low, close));
        variance = params.omega + params.alpha * r * r + params.beta * variance;
    }
    PriceSeries::new(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: GarchParams = GarchParams::new(1e-5, 0.05, 0.90);

    #[test]
    fn same_seed_same_path() {
        let a = simulate_returns(&PARAMS, 200, 3).unwrap();
        let b = simulate_returns(&PARAMS, 200, 3).unwrap();
        let c = simulate_returns(&PARAMS, 200, 4).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn sample_variance_near_long_run_level() {
        let r = simulate_returns(&PARAMS, 20_000, 17).unwrap();
        let var = r.iter().map(|x| x * x).sum::<f64>() / r.len() as f64;
        // V_L = 1e-5 / 0.05 = 2e-4
        assert!((var - 2e-4).abs() < 4e-5, "sample variance {var}");
    }

    #[test]
    fn non_stationary_params_rejected() {
        let explosive = GarchParams::new(1e-5, 0.2, 0.85);
        assert!(matches!(
            simulate_returns(&explosive, 10, 1),
            Err(GarchError::DegeneratePersistence { .. })
        ));
        let zero_omega = GarchParams::new(0.0, 0.05, 0.9);
        assert!(simulate_returns(&zero_omega, 10, 1).is_err());
    }

    #[test]
    fn prices_compound_returns() {
        let prices = prices_from_returns(100.0, &[0.1, -0.1, 0.0]);
        assert_eq!(prices.len(), 4);
        assert!((prices[1] - 100.0 * 0.1f64.exp()).abs() < 1e-12);
        assert!((prices[2] - 100.0).abs() < 1e-12);
        assert!((prices[3] - prices[2]).abs() < 1e-12);
    }

    #[test]
    fn bars_are_consistent_business_days() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(); // Friday
        let series = synthetic_bars(&PARAMS, 30, 8, 50.0, start).unwrap();
        assert_eq!(series.len(), 31);
        let bars = series.bars();
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 8));
        for w in bars.windows(2) {
            assert!(w[1].date > w[0].date);
            assert_eq!(w[1].open, w[0].close);
        }
        for b in bars {
            assert!(b.low <= b.open.min(b.close) && b.high >= b.open.max(b.close));
            let wd = b.date.unwrap().weekday();
            assert!(wd != Weekday::Sat && wd != Weekday::Sun);
        }
    }
}
