//! # Backtest
//!
//! $$
//! V_t = \prod_{s \le t} (1 + \mathbf w^\top \mathbf r_s), \qquad
//! \mathrm{DD}_t = \frac{V_t - \max_{s \le t} V_s}{\max_{s \le t} V_s}
//! $$
//!
//! Replay a fixed weight vector over historical daily returns and compare the compounded
//! result with the benchmark.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::ArrayView1;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::config::EngineConfig;
use crate::data::Panel;
use crate::data::Series;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::portfolio::WeightVector;
use crate::stats::sample_std;
use crate::stats::sharpe_ratio;

/// Weights handed to the simulator.
#[derive(Clone, Debug, PartialEq)]
pub enum WeightsInput {
  /// Ticker → weight. Reordered to the canonical ticker order; unknown tickers are ignored and
  /// missing ones get zero weight.
  Mapping(BTreeMap<String, f64>),
  /// Positional weights in canonical ticker order, used as given.
  Vector(Vec<f64>),
}

impl From<Vec<f64>> for WeightsInput {
  fn from(weights: Vec<f64>) -> Self {
    Self::Vector(weights)
  }
}

impl From<&[f64]> for WeightsInput {
  fn from(weights: &[f64]) -> Self {
    Self::Vector(weights.to_vec())
  }
}

impl From<BTreeMap<String, f64>> for WeightsInput {
  fn from(weights: BTreeMap<String, f64>) -> Self {
    Self::Mapping(weights)
  }
}

impl From<HashMap<String, f64>> for WeightsInput {
  fn from(weights: HashMap<String, f64>) -> Self {
    Self::Mapping(weights.into_iter().collect())
  }
}

impl From<&WeightVector> for WeightsInput {
  fn from(weights: &WeightVector) -> Self {
    Self::Mapping(weights.iter().map(|(t, w)| (t.to_string(), w)).collect())
  }
}

/// Scalar summary of one compounded return stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BacktestMetrics {
  pub total_return: f64,
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  pub sharpe_ratio: f64,
  /// Most negative drawdown, always `<= 0`.
  pub max_drawdown: f64,
}

/// Full output of one replay.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestResult {
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub num_days: usize,
  /// Weights actually replayed, in canonical ticker order.
  pub weights: Vec<f64>,
  pub daily_returns: Series,
  /// `Π(1 + r)`; the first value is `1 + r_0`.
  pub cumulative_returns: Series,
  pub drawdowns: Series,
  pub benchmark_cumulative_returns: Series,
  pub metrics: BacktestMetrics,
  pub benchmark_metrics: BacktestMetrics,
}

/// Replay `weights` over `returns` (portfolio tickers only) restricted to `[start, end]`.
///
/// Benchmark dates missing from the realized window count as zero-return days.
pub fn backtest(
  returns: &Panel,
  benchmark: &Series,
  weights: &WeightsInput,
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
  config: &EngineConfig,
) -> Result<BacktestResult> {
  let window = returns.between(start, end);
  let (Some(start_date), Some(end_date)) = (window.first_date(), window.last_date()) else {
    return Err(PortfolioError::EmptyRange(format!(
      "no returns between {} and {}",
      start.map_or("the beginning".to_string(), |d| d.to_string()),
      end.map_or("the end".to_string(), |d| d.to_string()),
    )));
  };

  let w = resolve_weights(returns.columns(), weights, config)?;
  let daily: Array1<f64> = window.values().dot(&w);
  let cumulative = compound(daily.view());
  let drawdowns = drawdown_series(cumulative.view());

  let bench = benchmark.reindex(window.dates(), 0.0);
  let bench_cumulative = compound(bench.values());

  let metrics = summarize(daily.view(), cumulative.view(), config);
  let benchmark_metrics = summarize(bench.values(), bench_cumulative.view(), config);
  let num_days = window.n_rows();

  info!(
    "Backtest {} to {} ({} days): total {:.4}, annualized {:.4}, volatility {:.4}, sharpe {:.4}, max drawdown {:.4}",
    start_date,
    end_date,
    num_days,
    metrics.total_return,
    metrics.annualized_return,
    metrics.annualized_volatility,
    metrics.sharpe_ratio,
    metrics.max_drawdown
  );
  info!(
    "Benchmark over the same period: total {:.4}, annualized {:.4}",
    benchmark_metrics.total_return, benchmark_metrics.annualized_return
  );

  let dates = window.dates().to_vec();
  Ok(BacktestResult {
    start_date,
    end_date,
    num_days,
    weights: w.to_vec(),
    daily_returns: Series::new(dates.clone(), daily)?,
    cumulative_returns: Series::new(dates.clone(), cumulative)?,
    drawdowns: Series::new(dates.clone(), drawdowns)?,
    benchmark_cumulative_returns: Series::new(dates, bench_cumulative)?,
    metrics,
    benchmark_metrics,
  })
}

fn resolve_weights(
  tickers: &[String],
  weights: &WeightsInput,
  config: &EngineConfig,
) -> Result<Array1<f64>> {
  let w = match weights {
    WeightsInput::Mapping(map) => {
      let mut w: Array1<f64> = tickers
        .iter()
        .map(|t| map.get(t).copied().unwrap_or(0.0))
        .collect();
      let total = w.sum();
      if !config.sums_to_one(total) && total > 0.0 {
        warn!("Weights sum to {:.6}; normalizing for the backtest", total);
        w /= total;
      }
      w
    }
    WeightsInput::Vector(v) => {
      if v.len() != tickers.len() {
        return Err(PortfolioError::DimensionMismatch {
          expected: tickers.len(),
          actual: v.len(),
        });
      }
      Array1::from(v.clone())
    }
  };

  if w.iter().any(|x| !x.is_finite()) {
    return Err(PortfolioError::Schema("weights must be finite".into()));
  }
  Ok(w)
}

fn compound(daily: ArrayView1<'_, f64>) -> Array1<f64> {
  let mut acc = 1.0;
  daily
    .iter()
    .map(|r| {
      acc *= 1.0 + r;
      acc
    })
    .collect()
}

fn drawdown_series(cumulative: ArrayView1<'_, f64>) -> Array1<f64> {
  let mut peak = f64::NEG_INFINITY;
  cumulative
    .iter()
    .map(|&v| {
      peak = peak.max(v);
      if peak > 0.0 {
        ((v - peak) / peak).min(0.0)
      } else {
        0.0
      }
    })
    .collect()
}

fn summarize(
  daily: ArrayView1<'_, f64>,
  cumulative: ArrayView1<'_, f64>,
  config: &EngineConfig,
) -> BacktestMetrics {
  let Some(&last) = cumulative.last() else {
    return BacktestMetrics::default();
  };

  let n = config.trading_days as f64;
  let total_return = last - 1.0;
  let annualized_return = (1.0 + total_return).powf(n / cumulative.len() as f64) - 1.0;
  let annualized_volatility = sample_std(daily) * n.sqrt();
  let max_drawdown = drawdown_series(cumulative).fold(0.0_f64, |acc, &d| acc.min(d));

  BacktestMetrics {
    total_return,
    annualized_return,
    annualized_volatility,
    sharpe_ratio: sharpe_ratio(annualized_return, annualized_volatility, config.risk_free_rate),
    max_drawdown,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::Array2;

  use super::*;

  fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(i as i64)
  }

  fn names(ts: &[&str]) -> Vec<String> {
    ts.iter().map(|t| t.to_string()).collect()
  }

  fn returns(values: Array2<f64>) -> Panel {
    let dates = (0..values.nrows()).map(day).collect();
    let cols = (0..values.ncols()).map(|j| ["A", "B", "C", "D"][j].to_string()).collect();
    Panel::new(dates, cols, values).unwrap()
  }

  fn flat_benchmark(n: usize, r: f64) -> Series {
    Series::new((0..n).map(day).collect(), Array1::from_elem(n, r)).unwrap()
  }

  #[test]
  fn first_cumulative_value_is_one_plus_first_return() {
    let rets = returns(ndarray::array![[0.02, -0.01], [0.01, 0.03], [-0.02, 0.0]]);
    let res = backtest(
      &rets,
      &flat_benchmark(3, 0.0),
      &vec![0.5, 0.5].into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    assert_abs_diff_eq!(res.cumulative_returns.values()[0], 1.005, epsilon = 1e-15);
    assert_eq!(res.num_days, 3);
    assert_eq!(res.start_date, day(0));
    assert_eq!(res.end_date, day(2));
  }

  #[test]
  fn constant_returns_compound_exactly() {
    let n = 40;
    let r: f64 = 0.003;
    let rets = returns(Array2::from_elem((n, 4), r));
    let res = backtest(
      &rets,
      &flat_benchmark(n, 0.001),
      &vec![0.25; 4].into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    assert_relative_eq!(res.metrics.total_return, (1.0 + r).powi(n as i32) - 1.0, epsilon = 1e-12);
    assert_relative_eq!(
      res.benchmark_metrics.total_return,
      1.001f64.powi(n as i32) - 1.0,
      epsilon = 1e-12
    );
    assert_eq!(res.metrics.max_drawdown, 0.0);
    assert_eq!(res.metrics.sharpe_ratio, 0.0);
  }

  #[test]
  fn daily_portfolio_return_is_weighted_sum() {
    let rets = returns(Array2::from_shape_fn((10, 3), |(_, j)| [0.01, 0.02, -0.01][j]));
    let res = backtest(
      &rets,
      &flat_benchmark(10, 0.0),
      &vec![0.5, 0.3, 0.2].into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    for r in res.daily_returns.values() {
      assert_abs_diff_eq!(*r, 0.009, epsilon = 1e-15);
    }
  }

  #[test]
  fn drawdown_is_never_positive() {
    let rets = returns(ndarray::array![[0.10], [-0.20], [0.05], [0.30], [-0.10]]);
    let res = backtest(
      &rets,
      &flat_benchmark(5, 0.0),
      &vec![1.0].into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    assert!(res.drawdowns.values().iter().all(|&d| d <= 0.0));
    // peak 1.1, trough 0.88
    assert_abs_diff_eq!(res.metrics.max_drawdown, -0.2, epsilon = 1e-12);
    assert_eq!(res.drawdowns.values()[0], 0.0);
  }

  #[test]
  fn mapping_is_reordered_and_renormalized() {
    let rets = returns(ndarray::array![[0.01, 0.03], [0.02, -0.01]]);
    let mut map = BTreeMap::new();
    map.insert("B".to_string(), 3.0);
    map.insert("A".to_string(), 1.0);
    map.insert("ZZZ".to_string(), 5.0);

    let res = backtest(
      &rets,
      &flat_benchmark(2, 0.0),
      &map.into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(res.weights, vec![0.25, 0.75]);
    assert_abs_diff_eq!(res.daily_returns.values()[0], 0.025, epsilon = 1e-15);
  }

  #[test]
  fn weight_vector_converts_to_mapping() {
    let w = WeightVector::new(names(&["B", "A"]), vec![0.4, 0.6]).unwrap();
    let rets = returns(ndarray::array![[0.01, 0.02]]);
    let res = backtest(
      &rets,
      &flat_benchmark(1, 0.0),
      &WeightsInput::from(&w),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(res.weights, vec![0.6, 0.4]);
  }

  #[test]
  fn wrong_vector_length_is_rejected() {
    let rets = returns(ndarray::array![[0.01, 0.02], [0.0, 0.01]]);
    let err = backtest(
      &rets,
      &flat_benchmark(2, 0.0),
      &vec![1.0].into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::DimensionMismatch { expected: 2, actual: 1 }));
  }

  #[test]
  fn empty_window_is_rejected() {
    let rets = returns(ndarray::array![[0.01], [0.02]]);
    let err = backtest(
      &rets,
      &flat_benchmark(2, 0.0),
      &vec![1.0].into(),
      Some(day(10)),
      None,
      &EngineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::EmptyRange(_)));
  }

  #[test]
  fn date_filter_and_missing_benchmark_days() {
    let rets = returns(Array2::from_elem((6, 1), 0.01));
    let bench = Series::new(vec![day(2), day(4)], ndarray::array![0.05, 0.05]).unwrap();
    let res = backtest(
      &rets,
      &bench,
      &vec![1.0].into(),
      Some(day(2)),
      Some(day(4)),
      &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(res.num_days, 3);
    let b = res.benchmark_cumulative_returns.values();
    assert_abs_diff_eq!(b[0], 1.05, epsilon = 1e-12);
    assert_abs_diff_eq!(b[1], 1.05, epsilon = 1e-12);
    assert_abs_diff_eq!(b[2], 1.05 * 1.05, epsilon = 1e-12);
  }

  #[test]
  fn annualizes_geometrically() {
    let rets = returns(ndarray::array![[0.01], [-0.005], [0.02], [0.0]]);
    let cfg = EngineConfig::default();
    let res = backtest(&rets, &flat_benchmark(4, 0.0), &vec![1.0].into(), None, None, &cfg)
      .unwrap();

    let total: f64 = 1.01 * 0.995 * 1.02 - 1.0;
    assert_relative_eq!(res.metrics.total_return, total, epsilon = 1e-12);
    assert_relative_eq!(
      res.metrics.annualized_return,
      (1.0 + total).powf(252.0 / 4.0) - 1.0,
      epsilon = 1e-9
    );
    let std = sample_std(ndarray::array![0.01, -0.005, 0.02, 0.0].view());
    assert_relative_eq!(res.metrics.annualized_volatility, std * 252f64.sqrt(), epsilon = 1e-12);
  }
}
