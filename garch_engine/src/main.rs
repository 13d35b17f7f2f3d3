/// main.rs — Volatility forecast entry point
///
/// Fits GARCH(1,1) to a daily price file and prints the forecast:
///   1. Load config from .env
///   2. Load OHLC prices and compute log returns
///   3. Fit (ω, α, β) by constrained maximum likelihood
///   4. Project annualised volatility `FORECAST_HORIZON` periods ahead
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use garch_engine::config::AppConfig;
use garch_engine::{ForecastProjector, GarchEstimator, PriceSeries};

fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════╗");
    info!("║      GARCH(1,1)  —  VOLATILITY FORECAST      ║");
    info!("╚══════════════════════════════════════════════╝");

    // ── Config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::from_env()?;
    info!(
        "Config: prices={} horizon={} max_iter={}",
        cfg.price_csv.display(), cfg.forecast_horizon, cfg.garch_max_iter
    );
    info!(
        "Start: ω₀={:.2e} α₀={:.3} β₀={:.3}",
        cfg.garch_omega0, cfg.garch_alpha0, cfg.garch_beta0
    );

    // ── Data ─────────────────────────────────────────────────────────────
    let prices = PriceSeries::from_csv(&cfg.price_csv)?;
    let returns = prices.log_returns();
    if returns.is_empty() {
        anyhow::bail!("No returns in {}.  Need at least two closes.", cfg.price_csv.display());
    }

    // ── Fit ──────────────────────────────────────────────────────────────
    let estimator = GarchEstimator::new(cfg.estimator_config())?;
    let fit = estimator.fit(&returns)?;
    println!("\n{fit}");

    let fit = if cfg.require_convergence {
        fit.ensure_converged()?
    } else {
        if !fit.converged() {
            warn!("Using unconverged fit; set GARCH_REQUIRE_CONVERGENCE=true to fail instead");
        }
        fit
    };

    // ── Forecast ─────────────────────────────────────────────────────────
    let forecast = ForecastProjector::from_fit(&fit)?.project(cfg.forecast_horizon, &returns)?;
    let latest = forecast
        .latest()
        .ok_or_else(|| anyhow::anyhow!("forecast series is empty"))?;
    let as_of = prices
        .return_dates()
        .last()
        .copied()
        .flatten()
        .map(|d| d.to_string())
        .unwrap_or_else(|| format!("return #{}", returns.len() - 1));

    println!("  As of          : {as_of}");
    println!("  Horizon        : {} periods", cfg.forecast_horizon);
    println!("  Forecast σ     : {:.2}%", latest * 100.0);
    println!("  Long-run σ     : {:.2}%", forecast.long_run_volatility() * 100.0);
    println!("  Decay rate a   : {:.5} (half-life {:.1} periods)",
        forecast.decay_rate, std::f64::consts::LN_2 / forecast.decay_rate);

    Ok(())
}
