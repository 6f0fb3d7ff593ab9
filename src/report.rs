//! # Report
//!
//! $$
//! \{(t_k, V_{t_k})\}_{k=1}^{n}
//! $$
//!
//! Serializable allocation reports. Time series are exposed as ordered `(date, value)` pairs so
//! any storage collaborator can consume them without knowing about [`crate::data::Series`].

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::backtest::BacktestMetrics;
use crate::backtest::BacktestResult;
use crate::error::Result;
use crate::portfolio::Allocation;
use crate::portfolio::Performance;
use crate::portfolio::PredictionMap;
use crate::portfolio::StrategyKind;
use crate::portfolio::WeightVector;

/// Scalar part of a backtest.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BacktestSummary {
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub num_days: usize,
  pub portfolio: BacktestMetrics,
  pub benchmark: BacktestMetrics,
}

/// Allocation of one strategy together with its replay.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyReport {
  /// Display name, `"Markowitz"` or `"Machine Learning"`.
  pub method: String,
  pub weights: WeightVector,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub predictions: Option<PredictionMap>,
  /// Historical metrics of `weights` over the full return history.
  pub performance: Performance,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub backtest: Option<BacktestSummary>,
  pub cumulative_returns_portfolio: Vec<(NaiveDate, f64)>,
  pub cumulative_returns_benchmark: Vec<(NaiveDate, f64)>,
  pub drawdowns: Vec<(NaiveDate, f64)>,
}

impl StrategyReport {
  /// Combine an allocation with its (optional) backtest.
  pub fn new(allocation: Allocation, backtest: Option<&BacktestResult>) -> Self {
    let (summary, portfolio, benchmark, drawdowns) = match backtest {
      Some(bt) => (
        Some(BacktestSummary {
          start_date: bt.start_date,
          end_date: bt.end_date,
          num_days: bt.num_days,
          portfolio: bt.metrics,
          benchmark: bt.benchmark_metrics,
        }),
        bt.cumulative_returns.points(),
        bt.benchmark_cumulative_returns.points(),
        bt.drawdowns.points(),
      ),
      None => (None, Vec::new(), Vec::new(), Vec::new()),
    };

    Self {
      method: allocation.method.to_string(),
      weights: allocation.weights,
      predictions: allocation.predictions,
      performance: allocation.performance,
      backtest: summary,
      cumulative_returns_portfolio: portfolio,
      cumulative_returns_benchmark: benchmark,
      drawdowns,
    }
  }
}

/// Stage at which a strategy gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
  Allocation,
  Backtest,
}

/// A strategy that produced no (complete) result, with its cause.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyFailure {
  pub strategy: StrategyKind,
  pub stage: FailureStage,
  pub message: String,
}

/// Response of one allocation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AllocationReport {
  pub tickers: Vec<String>,
  pub benchmark: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub markowitz: Option<StrategyReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub machine_learning: Option<StrategyReport>,
  pub failures: Vec<StrategyFailure>,
}

impl AllocationReport {
  /// Pretty-printed JSON.
  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

/// Write any report as pretty JSON to `path`.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref();
  let mut writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer_pretty(&mut writer, value)?;
  writer.flush()?;
  info!("Results saved to {}", path.display());
  Ok(())
}

#[cfg(test)]
mod tests {
  use ndarray::array;
  use serde_json::Value;

  use super::*;
  use crate::config::EngineConfig;
  use crate::data::Panel;
  use crate::data::Series;
  use crate::backtest::backtest;

  fn sample() -> (Allocation, BacktestResult) {
    let d0 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let dates = vec![d0, d0.succ_opt().unwrap()];
    let returns = Panel::new(
      dates.clone(),
      vec!["A".into(), "B".into()],
      array![[0.01, 0.02], [-0.01, 0.0]],
    )
    .unwrap();
    let bench = Series::new(dates, array![0.005, 0.005]).unwrap();
    let weights = WeightVector::new(vec!["A".into(), "B".into()], vec![0.5, 0.5]).unwrap();
    let bt = backtest(
      &returns,
      &bench,
      &(&weights).into(),
      None,
      None,
      &EngineConfig::default(),
    )
    .unwrap();

    let alloc = Allocation {
      method: StrategyKind::MeanVariance,
      weights,
      performance: Performance::default(),
      predictions: None,
    };
    (alloc, bt)
  }

  #[test]
  fn series_serialize_as_ordered_date_value_pairs() {
    let (alloc, bt) = sample();
    let report = StrategyReport::new(alloc, Some(&bt));
    let json: Value = serde_json::to_value(&report).unwrap();

    assert_eq!(json["method"], "Markowitz");
    assert_eq!(json["cumulative_returns_portfolio"][0][0], "2024-03-01");
    assert_eq!(json["cumulative_returns_portfolio"][1][0], "2024-03-02");
    assert_eq!(json["backtest"]["num_days"], 2);
    assert!(json.get("predictions").is_none());
  }

  #[test]
  fn saves_report_to_disk() {
    let (alloc, bt) = sample();
    let report = AllocationReport {
      tickers: vec!["A".into(), "B".into()],
      benchmark: "IDX".into(),
      markowitz: Some(StrategyReport::new(alloc, Some(&bt))),
      machine_learning: None,
      failures: vec![StrategyFailure {
        strategy: StrategyKind::MachineLearning,
        stage: FailureStage::Allocation,
        message: "no models".into(),
      }],
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    save_json(&report, &path).unwrap();

    let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back["benchmark"], "IDX");
    assert_eq!(back["markowitz"]["weights"]["A"], 0.5);
    assert_eq!(back["failures"][0]["stage"], "allocation");
    assert!(back.get("machine_learning").is_none());
  }
}
