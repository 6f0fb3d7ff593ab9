//! # Portfolio Engine
//!
//! $$
//! \text{observations} \xrightarrow{\text{align}} R \xrightarrow{\text{features}} X
//! \xrightarrow{\text{optimize}} \mathbf w \xrightarrow{\text{backtest}} V
//! $$
//!
//! Session type owning one aligned history, plus the request-shaped entry point that runs both
//! strategies and their backtests.

use chrono::NaiveDate;
use ndarray::Array1;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::backtest::backtest;
use crate::backtest::BacktestResult;
use crate::backtest::WeightsInput;
use crate::config::EngineConfig;
use crate::data::align;
use crate::data::AlignedData;
use crate::data::RawObservation;
use crate::error::Result;
use crate::features::build_features;
use crate::features::FeatureSet;
use crate::portfolio::evaluate;
use crate::portfolio::optimize_markowitz;
use crate::portfolio::optimize_predictive;
use crate::portfolio::Allocation;
use crate::portfolio::ModelMap;
use crate::portfolio::Performance;
use crate::portfolio::StrategyKind;
use crate::portfolio::WeightVector;
use crate::report::AllocationReport;
use crate::report::FailureStage;
use crate::report::StrategyFailure;
use crate::report::StrategyReport;

/// One optimizer session over an aligned, read-only history.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: EngineConfig,
  data: AlignedData,
}

impl PortfolioEngine {
  /// Validate `config`, then align `observations` for `tickers` and `benchmark`.
  pub fn new(
    observations: &[RawObservation],
    tickers: &[String],
    benchmark: &str,
    config: EngineConfig,
  ) -> Result<Self> {
    config.validate()?;
    let data = align(observations, tickers, benchmark)?;
    Ok(Self { config, data })
  }

  /// Wrap already aligned data.
  pub fn from_aligned(data: AlignedData, config: EngineConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config, data })
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn data(&self) -> &AlignedData {
    &self.data
  }

  pub fn tickers(&self) -> &[String] {
    &self.data.tickers
  }

  /// Historical annualized metrics of `weights`; tickers absent from `weights` weigh zero.
  pub fn performance(&self, weights: &WeightVector) -> Result<Performance> {
    let w: Array1<f64> = self
      .tickers()
      .iter()
      .map(|t| weights.get(t).unwrap_or(0.0))
      .collect();
    evaluate(
      w.view(),
      &self.data.portfolio_returns,
      self.config.risk_free_rate,
      self.config.trading_days,
    )
  }

  pub fn optimize_markowitz(&self) -> Result<Allocation> {
    optimize_markowitz(
      &self.data.portfolio_returns,
      self.config.risk_free_rate,
      self.config.trading_days,
      &self.config.optimizer,
    )
  }

  /// Feature table and forward targets; empty when history is too short.
  pub fn prepare_features(&self) -> FeatureSet {
    build_features(
      &self.data.portfolio_returns,
      &self.data.benchmark_returns,
      &self.config.features,
    )
  }

  pub fn optimize_predictive(
    &self,
    models: &ModelMap,
    features: &FeatureSet,
  ) -> Result<Option<Allocation>> {
    optimize_predictive(models, features, &self.data.portfolio_returns, &self.config)
  }

  /// Run the requested strategy; `Ok(None)` means the strategy is not computable.
  pub fn allocate(
    &self,
    kind: StrategyKind,
    models: &ModelMap,
    features: &FeatureSet,
  ) -> Result<Option<Allocation>> {
    match kind {
      StrategyKind::MeanVariance => self.optimize_markowitz().map(Some),
      StrategyKind::MachineLearning => self.optimize_predictive(models, features),
    }
  }

  pub fn backtest(
    &self,
    weights: &WeightsInput,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
  ) -> Result<BacktestResult> {
    backtest(
      &self.data.portfolio_returns,
      &self.data.benchmark_returns,
      weights,
      start,
      end,
      &self.config,
    )
  }

  /// First feature date when features exist, else the return date one year in.
  ///
  /// `None` means the whole history is replayed.
  pub fn default_backtest_start(&self, features: &FeatureSet) -> Option<NaiveDate> {
    if let Some(date) = features.features.first_date() {
      return Some(date);
    }
    let dates = self.data.portfolio_returns.dates();
    if dates.len() > self.config.trading_days {
      Some(dates[self.config.trading_days])
    } else {
      None
    }
  }
}

/// "Allocate this universe against this benchmark over this period."
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
  pub tickers: Vec<String>,
  pub benchmark: String,
  #[serde(default)]
  pub start: Option<NaiveDate>,
  #[serde(default)]
  pub end: Option<NaiveDate>,
}

/// Observations dated within `[start, end]`.
pub fn filter_observations(
  observations: &[RawObservation],
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Vec<RawObservation> {
  observations
    .iter()
    .filter(|o| start.map_or(true, |s| o.date >= s) && end.map_or(true, |e| o.date <= e))
    .cloned()
    .collect()
}

/// Align, run both strategies and backtest each allocation from the default start.
///
/// Alignment errors fail the request. A strategy that cannot be computed is recorded in
/// [`AllocationReport::failures`] without affecting the other one.
pub fn run_allocation(
  observations: &[RawObservation],
  request: &AllocationRequest,
  models: &ModelMap,
  config: &EngineConfig,
) -> Result<AllocationReport> {
  info!(
    "Allocation request: tickers {:?}, benchmark {}, period {:?} to {:?}",
    request.tickers, request.benchmark, request.start, request.end
  );
  let window = filter_observations(observations, request.start, request.end);
  let engine = PortfolioEngine::new(&window, &request.tickers, &request.benchmark, config.clone())?;

  let features = engine.prepare_features();
  let start = engine.default_backtest_start(&features);
  info!("Backtest start: {:?}", start);

  let mut report = AllocationReport {
    tickers: engine.tickers().to_vec(),
    benchmark: request.benchmark.clone(),
    ..AllocationReport::default()
  };

  for kind in [StrategyKind::MeanVariance, StrategyKind::MachineLearning] {
    let allocation = match engine.allocate(kind, models, &features) {
      Ok(Some(allocation)) => allocation,
      Ok(None) => {
        report.failures.push(StrategyFailure {
          strategy: kind,
          stage: FailureStage::Allocation,
          message: "not computable: no applicable model or insufficient feature history".into(),
        });
        continue;
      }
      Err(e) => {
        warn!("{} allocation failed: {}", kind, e);
        report.failures.push(StrategyFailure {
          strategy: kind,
          stage: FailureStage::Allocation,
          message: e.to_string(),
        });
        continue;
      }
    };

    let replay = match engine.backtest(&WeightsInput::from(&allocation.weights), start, None) {
      Ok(bt) => Some(bt),
      Err(e) => {
        warn!("{} backtest failed: {}", kind, e);
        report.failures.push(StrategyFailure {
          strategy: kind,
          stage: FailureStage::Backtest,
          message: e.to_string(),
        });
        None
      }
    };

    let strategy = StrategyReport::new(allocation, replay.as_ref());
    match kind {
      StrategyKind::MeanVariance => report.markowitz = Some(strategy),
      StrategyKind::MachineLearning => report.machine_learning = Some(strategy),
    }
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::error::PortfolioError;
  use crate::portfolio::LinearPredictor;

  fn names(ts: &[&str]) -> Vec<String> {
    ts.iter().map(|t| t.to_string()).collect()
  }

  fn synthetic(n: usize) -> Vec<RawObservation> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut out = Vec::new();
    for (j, ticker) in ["AAA", "BBB", "CCC", "IDX"].iter().enumerate() {
      let mut price = 100.0;
      for t in 0..n {
        let r = 0.0004 * (j as f64 + 1.0) + 0.01 * ((t as f64) * (0.21 + 0.07 * j as f64)).sin();
        price *= 1.0 + r;
        out.push(RawObservation::close_only(
          start + chrono::Duration::days(t as i64),
          ticker.to_string(),
          price,
        ));
      }
    }
    out
  }

  fn request() -> AllocationRequest {
    AllocationRequest {
      tickers: names(&["AAA", "BBB", "CCC"]),
      benchmark: "IDX".into(),
      start: None,
      end: None,
    }
  }

  #[test]
  fn engine_keeps_portfolio_and_benchmark_apart() {
    let engine =
      PortfolioEngine::new(&synthetic(60), &names(&["AAA", "BBB"]), "IDX", EngineConfig::default())
        .unwrap();

    assert_eq!(engine.tickers(), &names(&["AAA", "BBB"]));
    assert_eq!(engine.data().portfolio_returns.n_cols(), 2);
    assert_eq!(engine.data().benchmark_returns.len(), 59);
  }

  #[test]
  fn performance_matches_evaluator() {
    let engine = PortfolioEngine::new(&synthetic(80), &names(&["AAA", "BBB", "CCC"]), "IDX", EngineConfig::default())
      .unwrap();
    let w = WeightVector::equal(engine.tickers());
    let perf = engine.performance(&w).unwrap();
    let check = evaluate(
      w.to_array().view(),
      &engine.data().portfolio_returns,
      0.02,
      252,
    )
    .unwrap();
    assert_eq!(perf, check);
  }

  #[test]
  fn default_start_prefers_first_feature_date() {
    let engine = PortfolioEngine::new(&synthetic(300), &names(&["AAA", "BBB", "CCC"]), "IDX", EngineConfig::default())
      .unwrap();
    let features = engine.prepare_features();
    assert_eq!(engine.default_backtest_start(&features), features.features.first_date());

    let short = PortfolioEngine::new(&synthetic(100), &names(&["AAA"]), "IDX", EngineConfig::default())
      .unwrap();
    let none = short.prepare_features();
    assert!(none.is_empty());
    assert_eq!(short.default_backtest_start(&none), None);
  }

  #[test]
  fn default_start_falls_back_to_one_year_in() {
    let config = EngineConfig {
      trading_days: 50,
      ..EngineConfig::default()
    };
    let engine = PortfolioEngine::new(&synthetic(100), &names(&["AAA"]), "IDX", config).unwrap();
    let features = engine.prepare_features();
    assert!(features.is_empty());
    assert_eq!(
      engine.default_backtest_start(&features),
      Some(engine.data().portfolio_returns.dates()[50])
    );
  }

  #[test]
  fn missing_benchmark_fails_the_request() {
    let req = AllocationRequest {
      benchmark: "NOPE".into(),
      ..request()
    };
    let err = run_allocation(&synthetic(60), &req, &HashMap::new(), &EngineConfig::default())
      .unwrap_err();
    assert!(matches!(err, PortfolioError::DataNotFound(_)));
  }

  #[test]
  fn runs_both_strategies() {
    let mut models: ModelMap = HashMap::new();
    let width = 3 * 8 + 2;
    models.insert("AAA".into(), Box::new(LinearPredictor::new(vec![0.0; width], 0.02)));
    models.insert("CCC".into(), Box::new(LinearPredictor::new(vec![0.0; width], 0.02)));
    models.insert("ZZZ".into(), Box::new(|_: &[f64]| 1.0));

    let report = run_allocation(&synthetic(300), &request(), &models, &EngineConfig::default())
      .unwrap();

    assert!(report.failures.is_empty());
    let mv = report.markowitz.as_ref().unwrap();
    assert_abs_diff_eq!(mv.weights.sum(), 1.0, epsilon = 1e-9);

    let ml = report.machine_learning.as_ref().unwrap();
    assert_eq!(ml.weights.weights(), &[0.5, 0.0, 0.5]);
    assert_eq!(ml.method, "Machine Learning");

    let bt = ml.backtest.as_ref().unwrap();
    assert_eq!(
      ml.cumulative_returns_portfolio.first().map(|p| p.0),
      Some(bt.start_date)
    );
    assert_eq!(bt.num_days, ml.cumulative_returns_benchmark.len());
  }

  #[test]
  fn missing_models_are_reported_not_fatal() {
    let report = run_allocation(&synthetic(300), &request(), &HashMap::new(), &EngineConfig::default())
      .unwrap();

    assert!(report.markowitz.is_some());
    assert!(report.machine_learning.is_none());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].strategy, StrategyKind::MachineLearning);
  }

  #[test]
  fn request_window_limits_history() {
    let req = AllocationRequest {
      start: Some(NaiveDate::from_ymd_opt(2020, 2, 1).unwrap()),
      end: Some(NaiveDate::from_ymd_opt(2020, 3, 31).unwrap()),
      ..request()
    };
    let window = filter_observations(&synthetic(300), req.start, req.end);
    assert!(window.iter().all(|o| o.date >= req.start.unwrap() && o.date <= req.end.unwrap()));

    let report = run_allocation(&synthetic(300), &req, &HashMap::new(), &EngineConfig::default())
      .unwrap();
    let bt = report.markowitz.unwrap().backtest.unwrap();
    assert_eq!(bt.start_date, NaiveDate::from_ymd_opt(2020, 2, 2).unwrap());
    assert_eq!(bt.end_date, NaiveDate::from_ymd_opt(2020, 3, 31).unwrap());
  }
}
