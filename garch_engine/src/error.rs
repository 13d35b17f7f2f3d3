/// error.rs — Typed failures of the GARCH engine
///
/// Numerical edge cases never surface as NaN: every recoverable problem is one
/// of these variants, so callers can decide whether a sample is usable.
use thiserror::Error;

use crate::models::estimator::FitDiagnostics;

#[derive(Debug, Error)]
pub enum GarchError {
    /// Fewer returns than the recursion needs to define a single variance.
    #[error("insufficient data: need at least {required} log returns, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A return that is NaN or infinite.
    #[error("log return at index {index} is not finite ({value})")]
    NonFiniteReturn { index: usize, value: f64 },

    /// The recursion produced a variance ≤ 0 (or non-finite), so the
    /// likelihood term −ln v − r²/v is undefined at `index`.
    #[error("conditional variance at index {index} is outside the likelihood domain (v = {variance:e})")]
    DomainViolation { index: usize, variance: f64 },

    /// The optimizer stopped before meeting its tolerances.
    #[error(
        "optimizer did not converge after {} iterations ({:?}, objective {:.6})",
        .diagnostics.iterations, .diagnostics.reason, .diagnostics.final_objective
    )]
    NotConverged { diagnostics: Box<FitDiagnostics> },

    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// α + β outside (0, 1): no finite long-run variance, no decay rate.
    #[error("degenerate persistence α+β = {persistence}; mean reversion requires 0 < α+β < 1")]
    DegeneratePersistence { persistence: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, GarchError>;
