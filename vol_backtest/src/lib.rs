/// lib.rs — Volatility forecast evaluation
///
/// Scores GARCH(1,1) forecasts from `garch_engine` against realized-volatility
/// baselines across forecast horizons, and exports the results.
pub mod evaluation;
pub mod reporting;

pub use evaluation::*;
pub use reporting::{ReportConfig, ReportGenerator, ReportMetadata, SweepReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let config = EvaluationConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        let _report = ReportConfig::default();
    }
}
