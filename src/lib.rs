//! # portfolio-rs
//!
//! $$
//! \mathbf w^\* = \arg\max_{\mathbf w \ge 0,\ \mathbf 1^\top \mathbf w = 1}
//! \frac{\mathbb E[R_p] - r_f}{\sigma_p}
//! $$
//!
//! Portfolio analytics engine. Long-format daily prices are aligned into dense panels, turned
//! into rolling-window features, allocated by a Sharpe-maximizing mean-variance optimizer or by
//! externally fitted return predictors, and replayed against a benchmark.
//!
//! ```ignore
//! use portfolio_rs::prelude::*;
//!
//! let observations = load_observations("prices.csv")?;
//! let request = AllocationRequest {
//!   tickers: vec!["AAPL".into(), "MSFT".into()],
//!   benchmark: "^GSPC".into(),
//!   start: None,
//!   end: None,
//! };
//! let report = run_allocation(&observations, &request, &ModelMap::new(), &EngineConfig::default())?;
//! ```

pub mod backtest;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod portfolio;
pub mod report;
pub mod stats;

pub mod prelude {
  pub use crate::backtest::backtest;
  pub use crate::backtest::BacktestMetrics;
  pub use crate::backtest::BacktestResult;
  pub use crate::backtest::WeightsInput;
  pub use crate::config::EngineConfig;
  pub use crate::config::FeatureConfig;
  pub use crate::config::OptimizerConfig;
  pub use crate::data::align;
  pub use crate::data::load_observations;
  pub use crate::data::read_observations;
  pub use crate::data::AlignedData;
  pub use crate::data::Panel;
  pub use crate::data::RawObservation;
  pub use crate::data::Series;
  pub use crate::engine::run_allocation;
  pub use crate::engine::AllocationRequest;
  pub use crate::engine::PortfolioEngine;
  pub use crate::error::PortfolioError;
  pub use crate::features::build_features;
  pub use crate::features::FeatureSet;
  pub use crate::portfolio::evaluate;
  pub use crate::portfolio::optimize_markowitz;
  pub use crate::portfolio::optimize_predictive;
  pub use crate::portfolio::Allocation;
  pub use crate::portfolio::LinearPredictor;
  pub use crate::portfolio::ModelMap;
  pub use crate::portfolio::ReturnPredictor;
  pub use crate::portfolio::StrategyKind;
  pub use crate::portfolio::WeightVector;
  pub use crate::report::save_json;
  pub use crate::report::AllocationReport;
  pub use crate::report::StrategyReport;
}
