//! # Performance
//!
//! $$
//! \mu_p = N\,\mathbf w^\top \bar{\mathbf r}, \qquad
//! \sigma_p = \sqrt{\mathbf w^\top (N\Sigma)\,\mathbf w}
//! $$
//!
//! Annualized return, volatility and Sharpe ratio of a fixed weight vector evaluated on
//! historical daily returns.

use ndarray::ArrayView1;

use super::types::Performance;
use crate::data::Panel;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::column_means;
use crate::stats::covariance;
use crate::stats::sharpe_ratio;

/// Evaluate `weights` (ordered like the columns of `returns`) on daily history.
pub fn evaluate(
  weights: ArrayView1<'_, f64>,
  returns: &Panel,
  risk_free: f64,
  trading_days: usize,
) -> Result<Performance> {
  if weights.len() != returns.n_cols() {
    return Err(PortfolioError::DimensionMismatch {
      expected: returns.n_cols(),
      actual: weights.len(),
    });
  }

  let mu = column_means(returns.values());
  let cov = covariance(returns.values());
  Ok(performance_from_moments(weights, mu.view(), &cov, risk_free, trading_days))
}

/// Same metrics from precomputed daily means and covariance.
pub(crate) fn performance_from_moments(
  weights: ArrayView1<'_, f64>,
  mu: ArrayView1<'_, f64>,
  cov: &ndarray::Array2<f64>,
  risk_free: f64,
  trading_days: usize,
) -> Performance {
  let n = trading_days as f64;
  let annual_return = weights.dot(&mu) * n;
  let variance = weights.dot(&cov.dot(&weights)) * n;
  let annual_volatility = variance.max(0.0).sqrt();

  Performance {
    annual_return,
    annual_volatility,
    sharpe_ratio: sharpe_ratio(annual_return, annual_volatility, risk_free),
  }
}
