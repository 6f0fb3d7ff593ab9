//! # Errors
//!
//! $$
//! \text{input} \to \text{Result}\langle T, \text{PortfolioError} \rangle
//! $$
//!
//! Error taxonomy shared by ingestion, alignment, optimization and backtesting.

use thiserror::Error;

/// Main error type for the portfolio engine.
#[derive(Error, Debug)]
pub enum PortfolioError {
  /// Input table is malformed (missing columns, duplicate rows, unparsable cells).
  #[error("schema error: {0}")]
  Schema(String),

  /// Required tickers or rows are absent from the supplied history.
  #[error("data not found: {0}")]
  DataNotFound(String),

  /// History exists but is too short or entirely undefined.
  #[error("insufficient data: {0}")]
  InsufficientData(String),

  /// Caller-supplied vector does not match the ticker universe.
  #[error("dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  /// Date filter selects no rows.
  #[error("empty range: {0}")]
  EmptyRange(String),

  /// Constrained solver failed or did not converge.
  #[error("optimization error: {0}")]
  Optimization(String),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[cfg(feature = "polars")]
  #[error("polars error: {0}")]
  Polars(#[from] polars::prelude::PolarsError),
}

/// Result alias for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;
