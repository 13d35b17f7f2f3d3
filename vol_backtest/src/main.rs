/// main.rs — Volatility forecast evaluation CLI
///
/// Fits GARCH(1,1), scores its forecasts against realized-volatility
/// baselines, and generates synthetic price files for demos.
///
/// Usage:
///   cargo run --bin vol_backtest -- fit --prices prices.csv
///   cargo run --bin vol_backtest -- sweep --prices prices.csv --output-dir reports
///   cargo run --bin vol_backtest -- --help
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use garch_engine::config::AppConfig;
use garch_engine::{synthetic_bars, ForecastMode, GarchEstimator, GarchParams, PriceSeries};
use vol_backtest::evaluation::{evaluate_horizon, sweep, EvaluationConfig};
use vol_backtest::reporting::{ReportConfig, ReportGenerator, ReportMetadata, SweepReport};

#[derive(Parser)]
#[command(name = "vol_backtest")]
#[command(about = "GARCH(1,1) volatility forecasts scored against realized-volatility baselines")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Average variance over the horizon
    TermAverage,
    /// Variance of the horizon's last period
    Point,
    /// V_L + (1 − e^{−a·h})(V₀ − V_L)
    Reference,
}

impl From<ModeArg> for ForecastMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::TermAverage => ForecastMode::TermAverage,
            ModeArg::Point => ForecastMode::Point,
            ModeArg::Reference => ForecastMode::Reference,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit GARCH(1,1) to a price file and print the parameters
    Fit {
        /// OHLC CSV (defaults to PRICE_CSV)
        #[arg(short, long)]
        prices: Option<PathBuf>,

        /// Also write the fit as JSON
        #[arg(short, long)]
        json: Option<PathBuf>,
    },

    /// Score one forecast horizon
    Evaluate {
        #[arg(short, long)]
        prices: Option<PathBuf>,

        /// Periods ahead (defaults to FORECAST_HORIZON)
        #[arg(long)]
        horizon: Option<usize>,

        /// Held-out share (defaults to TEST_FRACTION)
        #[arg(short, long)]
        test_fraction: Option<f64>,

        #[arg(short, long, value_enum, default_value = "term-average")]
        mode: ModeArg,
    },

    /// Score a range of horizons in parallel and export the table
    Sweep {
        #[arg(short, long)]
        prices: Option<PathBuf>,

        #[arg(long, default_value = "5")]
        start: usize,

        #[arg(long, default_value = "245")]
        end: usize,

        #[arg(long, default_value = "5")]
        step: usize,

        #[arg(short, long)]
        test_fraction: Option<f64>,

        #[arg(short, long, value_enum, default_value = "term-average")]
        mode: ModeArg,

        /// Report directory (defaults to OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print only, write no files
        #[arg(long)]
        no_export: bool,
    },

    /// Write a synthetic GARCH(1,1) OHLC price file
    Simulate {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 'n', long, default_value = "2500")]
        periods: usize,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "1e-5")]
        omega: f64,

        #[arg(long, default_value = "0.05")]
        alpha: f64,

        #[arg(long, default_value = "0.9")]
        beta: f64,

        #[arg(long, default_value = "100")]
        start_price: f64,

        /// First bar date (YYYY-MM-DD)
        #[arg(long, default_value = "2015-01-02")]
        start_date: NaiveDate,
    },
}

fn evaluation_config(cfg: &AppConfig, test_fraction: Option<f64>, mode: ModeArg) -> EvaluationConfig {
    EvaluationConfig {
        test_fraction: test_fraction.unwrap_or(cfg.test_fraction),
        estimator: cfg.estimator_config(),
        mode: mode.into(),
        require_convergence: cfg.require_convergence,
    }
}

fn load(prices: Option<PathBuf>, cfg: &AppConfig) -> Result<(PathBuf, PriceSeries)> {
    let path = prices.unwrap_or_else(|| cfg.price_csv.clone());
    let series = PriceSeries::from_csv(&path)?;
    Ok((path, series))
}

fn run_fit(cfg: &AppConfig, prices: Option<PathBuf>, json: Option<&Path>) -> Result<()> {
    let (_, series) = load(prices, cfg)?;
    let fit = GarchEstimator::new(cfg.estimator_config())?.fit(&series.log_returns())?;
    println!("\n{fit}");
    let fit = if cfg.require_convergence { fit.ensure_converged()? } else { fit };
    if let Some(path) = json {
        std::fs::write(path, serde_json::to_string_pretty(&fit)?)?;
        info!("Fit written to {}", path.display());
    }
    Ok(())
}

fn run_evaluate(
    cfg: &AppConfig,
    prices: Option<PathBuf>,
    horizon: Option<usize>,
    test_fraction: Option<f64>,
    mode: ModeArg,
) -> Result<()> {
    let (_, series) = load(prices, cfg)?;
    let horizon = horizon.unwrap_or(cfg.forecast_horizon);
    let report = evaluate_horizon(&series, horizon, &evaluation_config(cfg, test_fraction, mode))?;
    let g = &report.garch;

    println!("\n{}", g.fit);
    println!("  Horizon {horizon}: train {} / test {} returns", g.split.train_len(), g.split.test_len());
    let show = |label: &str, s: Option<garch_engine::metrics::ForecastScore>| match s {
        Some(s) => println!("  {label:<16}: {s}"),
        None => println!("  {label:<16}: n/a"),
    };
    show("GARCH (train)", g.train);
    show("GARCH (test)", g.test);
    for b in &report.baselines {
        show(format!("{} (test)", b.estimator).as_str(), b.test);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_sweep(
    cfg: &AppConfig,
    prices: Option<PathBuf>,
    start: usize,
    end: usize,
    step: usize,
    test_fraction: Option<f64>,
    mode: ModeArg,
    output_dir: Option<PathBuf>,
    no_export: bool,
) -> Result<()> {
    if step == 0 || start < 2 || end < start {
        anyhow::bail!("invalid horizon range {start}..={end} step {step} (horizons start at 2)");
    }
    let (path, series) = load(prices, cfg)?;
    let horizons: Vec<usize> = (start..=end).step_by(step).collect();
    let eval_cfg = evaluation_config(cfg, test_fraction, mode);

    let rows = sweep(&series, &horizons, &eval_cfg)?;
    let report = SweepReport::new(
        ReportMetadata {
            generated_at: Utc::now(),
            source: path.display().to_string(),
            n_bars: series.len(),
            test_fraction: eval_cfg.test_fraction,
        },
        rows,
    );
    println!("\n{report}");

    if !no_export {
        let generator = ReportGenerator::new(ReportConfig {
            output_dir: output_dir.unwrap_or_else(|| cfg.output_dir.clone()),
            ..ReportConfig::default()
        });
        generator.export(&report)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    output: &Path,
    periods: usize,
    seed: u64,
    omega: f64,
    alpha: f64,
    beta: f64,
    start_price: f64,
    start_date: NaiveDate,
) -> Result<()> {
    let params = GarchParams::new(omega, alpha, beta);
    let series = synthetic_bars(&params, periods, seed, start_price, start_date)?;
    series.write_csv(output)?;
    info!(
        "Wrote {} bars (ω={omega:.2e} α={alpha} β={beta}, seed {seed}) to {}",
        series.len(),
        output.display()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fit { prices, json } => {
            let cfg = AppConfig::from_env()?;
            run_fit(&cfg, prices, json.as_deref())
        }
        Commands::Evaluate { prices, horizon, test_fraction, mode } => {
            let cfg = AppConfig::from_env()?;
            run_evaluate(&cfg, prices, horizon, test_fraction, mode)
        }
        Commands::Sweep { prices, start, end, step, test_fraction, mode, output_dir, no_export } => {
            let cfg = AppConfig::from_env()?;
            run_sweep(&cfg, prices, start, end, step, test_fraction, mode, output_dir, no_export)
        }
        Commands::Simulate { output, periods, seed, omega, alpha, beta, start_price, start_date } => {
            run_simulate(&output, periods, seed, omega, alpha, beta, start_price, start_date)
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("Application error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "vol_backtest", "sweep", "--prices", "ixic.csv", "--start", "10", "--end", "50",
            "--mode", "point", "--no-export",
        ])
        .unwrap();
        match cli.command {
            Commands::Sweep { prices, start, end, step, mode, no_export, .. } => {
                assert_eq!(prices, Some(PathBuf::from("ixic.csv")));
                assert_eq!((start, end, step), (10, 50, 5));
                assert_eq!(mode, ModeArg::Point);
                assert!(no_export);
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn reference_mode_selectable() {
        let cli = Cli::try_parse_from([
            "vol_backtest", "evaluate", "--horizon", "20", "--mode", "reference",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate { horizon, mode, .. } => {
                assert_eq!(horizon, Some(20));
                assert_eq!(ForecastMode::from(mode), ForecastMode::Reference);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn simulate_defaults_and_date_parsing() {
        let cli = Cli::try_parse_from(["vol_backtest", "simulate", "-o", "out.csv"]).unwrap();
        match cli.command {
            Commands::Simulate { periods, seed, alpha, start_date, .. } => {
                assert_eq!(periods, 2500);
                assert_eq!(seed, 42);
                assert_eq!(alpha, 0.05);
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2015, 1, 2).unwrap());
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn simulate_then_fit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.csv");
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        run_simulate(&path, 300, 1, 1e-5, 0.05, 0.9, 100.0, start).unwrap();

        let series = PriceSeries::from_csv(&path).unwrap();
        assert_eq!(series.len(), 301);
        let fit = GarchEstimator::default().fit(&series.log_returns()).unwrap();
        assert!(fit.gamma > 0.0);
    }
}
