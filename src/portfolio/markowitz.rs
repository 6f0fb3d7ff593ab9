//! # Mean-Variance Optimizer
//!
//! $$
//! \max_{\mathbf w \in \Delta} \frac{N\,\mathbf w^\top\mu - r_f}{\sqrt{N\,\mathbf w^\top \Sigma \mathbf w}},
//! \qquad \Delta = \{\mathbf w \ge 0,\ \mathbf 1^\top \mathbf w = 1\}
//! $$
//!
//! Sharpe-maximizing long-only, fully invested allocation. The simplex constraint is
//! enforced by a softmax parameterisation and the negated Sharpe is minimized with
//! Nelder-Mead, seeded from equal weights.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::info;

use super::performance::performance_from_moments;
use super::types::Allocation;
use super::types::StrategyKind;
use super::types::WeightVector;
use crate::config::OptimizerConfig;
use crate::data::Panel;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::column_means;
use crate::stats::covariance;
use crate::stats::sharpe_ratio;

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 || !sum.is_finite() {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

struct NegativeSharpe {
  mu: Array1<f64>,
  cov: Array2<f64>,
  risk_free: f64,
  trading_days: f64,
}

impl NegativeSharpe {
  fn sharpe(&self, w: &Array1<f64>) -> f64 {
    let ret = w.dot(&self.mu) * self.trading_days;
    let vol = (w.dot(&self.cov.dot(w)) * self.trading_days).max(0.0).sqrt();
    sharpe_ratio(ret, vol, self.risk_free)
  }
}

impl CostFunction for NegativeSharpe {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = Array1::from(softmax(x));
    Ok(-self.sharpe(&w))
  }
}

/// Maximize the annualized Sharpe ratio over long-only, fully invested weights.
///
/// `returns` must hold portfolio tickers only. Non-convergence within
/// [`OptimizerConfig::max_iters`] or a solver failure is reported as
/// [`PortfolioError::Optimization`].
pub fn optimize_markowitz(
  returns: &Panel,
  risk_free: f64,
  trading_days: usize,
  config: &OptimizerConfig,
) -> Result<Allocation> {
  let n = returns.n_cols();
  if n == 0 {
    return Err(PortfolioError::DataNotFound(
      "no portfolio tickers to optimize".into(),
    ));
  }
  if returns.is_empty() {
    return Err(PortfolioError::InsufficientData(
      "no return history to optimize on".into(),
    ));
  }

  let mu = column_means(returns.values());
  let cov = covariance(returns.values());
  let cost = NegativeSharpe {
    mu: mu.clone(),
    cov: cov.clone(),
    risk_free,
    trading_days: trading_days as f64,
  };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(config.sd_tolerance)
    .map_err(|e| PortfolioError::Optimization(format!("invalid solver setup: {e}")))?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(config.max_iters))
    .run()
    .map_err(|e| PortfolioError::Optimization(format!("solver failed: {e}")))?;

  let state = res.state;
  debug!(
    "Nelder-Mead finished after {} iterations: {:?}",
    state.iter, state.termination_status
  );
  if matches!(
    state.termination_status,
    TerminationStatus::Terminated(TerminationReason::MaxItersReached)
  ) {
    return Err(PortfolioError::Optimization(format!(
      "no convergence within {} iterations (best objective {})",
      config.max_iters, state.best_cost
    )));
  }

  let best_x = state
    .best_param
    .ok_or_else(|| PortfolioError::Optimization("solver returned no parameters".into()))?;
  if !state.best_cost.is_finite() {
    return Err(PortfolioError::Optimization(format!(
      "non-finite objective {}",
      state.best_cost
    )));
  }

  let weights = WeightVector::new(returns.columns().to_vec(), softmax(&best_x))?.normalized();
  let performance =
    performance_from_moments(weights.to_array().view(), mu.view(), &cov, risk_free, trading_days);

  info!(
    "Markowitz allocation: return {:.4}, volatility {:.4}, sharpe {:.4}",
    performance.annual_return, performance.annual_volatility, performance.sharpe_ratio
  );
  for (ticker, w) in weights.iter() {
    debug!("  {}: {:.4}", ticker, w);
  }

  Ok(Allocation {
    method: StrategyKind::MeanVariance,
    weights,
    performance,
    predictions: None,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::portfolio::performance::evaluate;

  fn panel(values: Array2<f64>) -> Panel {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let dates = (0..values.nrows())
      .map(|i| start + chrono::Duration::days(i as i64))
      .collect();
    let cols = (0..values.ncols()).map(|j| format!("T{j}")).collect();
    Panel::new(dates, cols, values).unwrap()
  }

  fn wavy_returns() -> Panel {
    panel(Array2::from_shape_fn((300, 3), |(t, j)| {
      let t = t as f64;
      match j {
        0 => 0.0008 + 0.010 * (t * 0.31).sin(),
        1 => 0.0004 + 0.006 * (t * 0.17 + 1.0).cos(),
        _ => 0.0002 + 0.015 * (t * 0.53 + 2.0).sin(),
      }
    }))
  }

  #[test]
  fn weights_are_long_only_and_fully_invested() {
    let returns = wavy_returns();
    let alloc = optimize_markowitz(&returns, 0.02, 252, &OptimizerConfig::default()).unwrap();

    assert_abs_diff_eq!(alloc.weights.sum(), 1.0, epsilon = 1e-9);
    assert!(alloc.weights.weights().iter().all(|&w| w >= 0.0));
    assert_eq!(alloc.method, StrategyKind::MeanVariance);
  }

  #[test]
  fn beats_equal_weight_and_single_assets() {
    let returns = wavy_returns();
    let alloc = optimize_markowitz(&returns, 0.02, 252, &OptimizerConfig::default()).unwrap();

    let equal = evaluate(Array1::from_elem(3, 1.0 / 3.0).view(), &returns, 0.02, 252).unwrap();
    assert!(alloc.performance.sharpe_ratio >= equal.sharpe_ratio - 1e-6);

    for j in 0..3 {
      let mut w = Array1::zeros(3);
      w[j] = 1.0;
      let single = evaluate(w.view(), &returns, 0.02, 252).unwrap();
      assert!(alloc.performance.sharpe_ratio >= single.sharpe_ratio - 1e-4);
    }
  }

  #[test]
  fn reported_performance_matches_evaluator() {
    let returns = wavy_returns();
    let alloc = optimize_markowitz(&returns, 0.02, 252, &OptimizerConfig::default()).unwrap();
    let check = evaluate(alloc.weights.to_array().view(), &returns, 0.02, 252).unwrap();

    assert_abs_diff_eq!(alloc.performance.sharpe_ratio, check.sharpe_ratio, epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_history_is_handled() {
    let returns = panel(Array2::from_shape_fn((40, 2), |(_, j)| [0.001, 0.002][j]));
    let alloc = optimize_markowitz(&returns, 0.02, 252, &OptimizerConfig::default()).unwrap();

    assert_eq!(alloc.performance.sharpe_ratio, 0.0);
    assert_abs_diff_eq!(alloc.weights.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn iteration_cap_reports_optimization_error() {
    let returns = wavy_returns();
    let cfg = OptimizerConfig {
      max_iters: 1,
      sd_tolerance: 1e-300,
    };
    let err = optimize_markowitz(&returns, 0.02, 252, &cfg).unwrap_err();
    assert!(matches!(err, PortfolioError::Optimization(_)));
  }

  #[test]
  fn softmax_stays_on_simplex() {
    let w = softmax(&[1000.0, 0.0, -1000.0]);
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert!(w.iter().all(|&x| x >= 0.0));
  }
}
