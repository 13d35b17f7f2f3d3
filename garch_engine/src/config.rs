/// config.rs — Centralised configuration loaded from .env
///
/// Every run parameter of the forecasting tools is defined here.
/// Loading happens once at startup; every command borrows &AppConfig.
use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::models::{EstimatorConfig, GarchParams};

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Input / output ───────────────────────────────────────────────
    /// Daily OHLC CSV (Date,Open,High,Low,Close,…)
    pub price_csv:  PathBuf,
    pub output_dir: PathBuf,

    // ── Evaluation ───────────────────────────────────────────────────
    /// Periods ahead to forecast
    pub forecast_horizon: usize,
    /// Share of returns held out (chronologically last) for scoring
    pub test_fraction:    f64,

    // ── GARCH(1,1) optimizer ─────────────────────────────────────────
    /// Starting guess ω₀
    pub garch_omega0: f64,
    /// Starting guess α₀
    pub garch_alpha0: f64,
    /// Starting guess β₀
    pub garch_beta0:  f64,
    pub garch_max_iter: usize,
    /// Fail the run instead of warning when the optimizer does not converge
    pub require_convergence: bool,
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env

        let defaults = EstimatorConfig::default();
        let cfg = Self {
            price_csv:  env::var("PRICE_CSV").unwrap_or_else(|_| "prices.csv".into()).into(),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "reports".into()).into(),

            forecast_horizon: parse_env("FORECAST_HORIZON", 20usize)?,
            test_fraction:    parse_env("TEST_FRACTION",    0.2)?,

            garch_omega0:   parse_env("GARCH_OMEGA0",   defaults.initial.omega)?,
            garch_alpha0:   parse_env("GARCH_ALPHA0",   defaults.initial.alpha)?,
            garch_beta0:    parse_env("GARCH_BETA0",    defaults.initial.beta)?,
            garch_max_iter: parse_env("GARCH_MAX_ITER", defaults.max_iterations)?,
            require_convergence: parse_env("GARCH_REQUIRE_CONVERGENCE", false)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast_horizon < 2 {
            anyhow::bail!("FORECAST_HORIZON must be at least 2, got {}", self.forecast_horizon);
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            anyhow::bail!("TEST_FRACTION must lie in (0, 1), got {}", self.test_fraction);
        }
        self.estimator_config().validate()?;
        Ok(())
    }

    /// Optimizer settings: the configured initial guess and iteration cap on
    /// top of the default bounds and tolerances.
    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            initial: GarchParams::new(self.garch_omega0, self.garch_alpha0, self.garch_beta0),
            max_iterations: self.garch_max_iter,
            ..EstimatorConfig::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = EstimatorConfig::default();
        Self {
            price_csv: "prices.csv".into(),
            output_dir: "reports".into(),
            forecast_horizon: 20,
            test_fraction: 0.2,
            garch_omega0: defaults.initial.omega,
            garch_alpha0: defaults.initial.alpha,
            garch_beta0: defaults.initial.beta,
            garch_max_iter: defaults.max_iterations,
            require_convergence: false,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_estimator_defaults() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        let est = cfg.estimator_config();
        assert_eq!(est.initial, GarchParams::new(1e-4, 0.01, 0.9));
        assert_eq!(est.max_iterations, 1000);
        assert_eq!(cfg.forecast_horizon, 20);
    }

    #[test]
    fn parse_env_reports_key_on_bad_value() {
        // Unique key so parallel tests cannot interfere.
        env::set_var("GARCH_TEST_PARSE_ENV_BAD", "not-a-number");
        let err = parse_env("GARCH_TEST_PARSE_ENV_BAD", 1.0f64).unwrap_err();
        assert!(err.to_string().contains("Config key GARCH_TEST_PARSE_ENV_BAD"), "{err}");

        env::set_var("GARCH_TEST_PARSE_ENV_OK", " 42 ");
        assert_eq!(parse_env("GARCH_TEST_PARSE_ENV_OK", 0usize).unwrap(), 42);
        assert_eq!(parse_env("GARCH_TEST_PARSE_ENV_UNSET", 7usize).unwrap(), 7);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = AppConfig { test_fraction: 1.0, ..AppConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = AppConfig { forecast_horizon: 1, ..AppConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = AppConfig { garch_beta0: 0.5, ..AppConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
