/// reporting.rs — Horizon sweep reports
///
/// Collects per-horizon evaluations into one table and exports it:
/// - Human-readable summary (`Display`)
/// - CSV, one row per horizon and one column per method (polars)
/// - JSON with every fit and score (serde_json)
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use garch_engine::metrics::ForecastScore;
use garch_engine::RealizedEstimator;

use crate::evaluation::HorizonReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    /// Price file the sweep ran on
    pub source: String,
    pub n_bars: usize,
    pub test_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub metadata: ReportMetadata,
    pub horizons: Vec<HorizonReport>,
}

fn r2(score: Option<ForecastScore>) -> Option<f64> {
    score.map(|s| s.r_squared)
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:>8.4}")).unwrap_or_else(|| format!("{:>8}", "n/a"))
}

impl SweepReport {
    pub fn new(metadata: ReportMetadata, horizons: Vec<HorizonReport>) -> Self {
        Self { metadata, horizons }
    }

    /// Horizon with the best out-of-sample GARCH R².
    pub fn best_garch_horizon(&self) -> Option<(usize, f64)> {
        self.horizons
            .iter()
            .filter_map(|h| r2(h.garch.test).map(|v| (h.horizon, v)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Result table: one row per horizon, one column per method.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = &self.horizons;
        let mut columns = vec![
            Column::new("horizon".into(), rows.iter().map(|r| r.horizon as u32).collect::<Vec<_>>()),
            Column::new("garch_train_r2".into(), rows.iter().map(|r| r2(r.garch.train)).collect::<Vec<_>>()),
            Column::new("garch_test_r2".into(), rows.iter().map(|r| r2(r.garch.test)).collect::<Vec<_>>()),
            Column::new("alpha".into(), rows.iter().map(|r| r.garch.fit.alpha()).collect::<Vec<_>>()),
            Column::new("beta".into(), rows.iter().map(|r| r.garch.fit.beta()).collect::<Vec<_>>()),
            Column::new(
                "long_run_vol".into(),
                rows.iter().map(|r| r.garch.fit.long_run_volatility()).collect::<Vec<_>>(),
            ),
            Column::new("converged".into(), rows.iter().map(|r| r.garch.fit.converged()).collect::<Vec<_>>()),
        ];
        for estimator in RealizedEstimator::ALL {
            let full: Vec<Option<f64>> = rows
                .iter()
                .map(|r| r.baseline(estimator).and_then(|b| r2(b.full)))
                .collect();
            let test: Vec<Option<f64>> = rows
                .iter()
                .map(|r| r.baseline(estimator).and_then(|b| r2(b.test)))
                .collect();
            columns.push(Column::new(format!("{}_r2", estimator.name()).into(), full));
            columns.push(Column::new(format!("{}_test_r2", estimator.name()).into(), test));
        }
        Ok(DataFrame::new(columns)?)
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "══════════════════════════════════════════════════════════════════════════════════")?;
        writeln!(f, "  VOLATILITY FORECAST EVALUATION — {}", self.metadata.source)?;
        writeln!(f, "  {} bars, last {:.0}% of each labelled sample held out (test R²)",
            self.metadata.n_bars, self.metadata.test_fraction * 100.0)?;
        writeln!(f, "══════════════════════════════════════════════════════════════════════════════════")?;
        write!(f, "  {:>4} {:>8} {:>8}", "h", "garch_in", "garch")?;
        for est in RealizedEstimator::ALL {
            let name = est.name();
            write!(f, " {:>8}", &name[..name.len().min(8)])?;
        }
        writeln!(f)?;
        for row in &self.horizons {
            write!(f, "  {:>4} {} {}", row.horizon, cell(r2(row.garch.train)), cell(r2(row.garch.test)))?;
            for est in RealizedEstimator::ALL {
                write!(f, " {}", cell(row.baseline(est).and_then(|b| r2(b.test))))?;
            }
            writeln!(f)?;
        }
        if let Some((h, v)) = self.best_garch_horizon() {
            writeln!(f, "  Best GARCH test R²: {v:.4} at h={h}")?;
        }
        writeln!(f, "══════════════════════════════════════════════════════════════════════════════════")
    }
}

/// Report generator configuration
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub export_csv: bool,
    pub export_json: bool,
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            export_csv: true,
            export_json: true,
            output_dir: PathBuf::from("./reports"),
        }
    }
}

pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Write the requested formats; returns the files written.
    pub fn export(&self, report: &SweepReport) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.config.output_dir)?;
        let base_name = format!(
            "vol_sweep_{}",
            report.metadata.generated_at.format("%Y%m%d_%H%M%S")
        );
        let mut written = Vec::new();

        if self.config.export_json {
            let path = self.config.output_dir.join(format!("{base_name}.json"));
            fs::write(&path, serde_json::to_string_pretty(report)?)?;
            info!("JSON report exported to: {}", path.display());
            written.push(path);
        }
        if self.config.export_csv {
            let path = self.config.output_dir.join(format!("{base_name}.csv"));
            write_csv(report, &path)?;
            info!("CSV results exported to: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn write_csv(report: &SweepReport, path: &Path) -> Result<()> {
    let mut df = report.to_dataframe()?;
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{sweep, EvaluationConfig};
    use chrono::NaiveDate;
    use garch_engine::{synthetic_bars, GarchParams};

    fn report() -> SweepReport {
        let start = NaiveDate::from_ymd_opt(2016, 1, 4).unwrap();
        let prices =
            synthetic_bars(&GarchParams::new(2e-6, 0.1, 0.88), 400, 5, 50.0, start).unwrap();
        let rows = sweep(&prices, &[10, 20], &EvaluationConfig::default()).unwrap();
        SweepReport::new(
            ReportMetadata {
                generated_at: Utc::now(),
                source: "synthetic".to_string(),
                n_bars: prices.len(),
                test_fraction: 0.2,
            },
            rows,
        )
    }

    #[test]
    fn table_has_one_row_per_horizon() {
        let r = report();
        let df = r.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        // 7 GARCH columns + 2 per realized estimator
        assert_eq!(df.width(), 7 + 2 * RealizedEstimator::ALL.len());
        assert!(df.column("parkinson_test_r2").is_ok());
        let text = r.to_string();
        assert!(text.contains("synthetic"));
        assert!(text.contains("garch"));
    }

    #[test]
    fn exports_csv_and_json() {
        let r = report();
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(ReportConfig {
            output_dir: dir.path().join("out"),
            ..ReportConfig::default()
        });
        let files = generator.export(&r).unwrap();
        assert_eq!(files.len(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(json["horizons"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(json["horizons"][0]["horizon"], 10);

        let csv = fs::read_to_string(&files[1]).unwrap();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("horizon,garch_train_r2,garch_test_r2"), "{header}");
        assert_eq!(csv.lines().count(), 3);
    }
}
