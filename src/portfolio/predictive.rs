//! # Prediction-Weighted Allocation
//!
//! $$
//! w_i = \frac{\max(\hat r_i, 0)}{\sum_j \max(\hat r_j, 0)}
//! $$
//!
//! Allocation proportional to positive forward-return predictions of externally fitted
//! per-ticker models. Input is generic via [`ReturnPredictor`], so any fitted model can be
//! plugged in.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use impl_new_derive::ImplNew;
use ndarray::ArrayView1;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::performance::evaluate;
use super::types::Allocation;
use super::types::PredictionMap;
use super::types::StrategyKind;
use super::types::WeightVector;
use crate::config::EngineConfig;
use crate::data::Panel;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::features::FeatureSet;

/// Already-fitted forward-return model for one ticker.
pub trait ReturnPredictor {
  /// Predict the next-period accumulated return from one feature row.
  fn predict(&self, features: &[f64]) -> Result<f64>;
}

impl<F> ReturnPredictor for F
where
  F: Fn(&[f64]) -> f64,
{
  fn predict(&self, features: &[f64]) -> Result<f64> {
    Ok(self(features))
  }
}

/// Ticker → fitted model.
pub type ModelMap = HashMap<String, Box<dyn ReturnPredictor>>;

/// Linear model `intercept + coefficients · x`.
#[derive(ImplNew, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
  /// One coefficient per feature column.
  pub coefficients: Vec<f64>,
  pub intercept: f64,
}

impl ReturnPredictor for LinearPredictor {
  fn predict(&self, features: &[f64]) -> Result<f64> {
    if features.len() != self.coefficients.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: self.coefficients.len(),
        actual: features.len(),
      });
    }
    let dot: f64 = self
      .coefficients
      .iter()
      .zip(features)
      .map(|(c, x)| c * x)
      .sum();
    Ok(self.intercept + dot)
  }
}

/// Load `{ "TICKER": { "coefficients": [..], "intercept": x } }` as a model map.
pub fn load_linear_models(path: impl AsRef<Path>) -> Result<ModelMap> {
  let path = path.as_ref();
  let content = fs::read_to_string(path)?;
  let fitted: BTreeMap<String, LinearPredictor> = serde_json::from_str(&content)?;
  info!("Loaded {} linear models from {}", fitted.len(), path.display());

  Ok(
    fitted
      .into_iter()
      .map(|(ticker, model)| (ticker, Box::new(model) as Box<dyn ReturnPredictor>))
      .collect(),
  )
}

/// Predict each ticker's forward return from `features`; tickers without a model get `0.0`.
pub fn predict_returns(
  models: &ModelMap,
  tickers: &[String],
  features: ArrayView1<'_, f64>,
) -> Result<PredictionMap> {
  let row = features.to_vec();
  let mut predictions = PredictionMap::new();
  for ticker in tickers {
    let value = match models.get(ticker) {
      Some(model) => model.predict(&row)?,
      None => 0.0,
    };
    predictions.insert(ticker.clone(), value);
  }
  Ok(predictions)
}

/// Weights proportional to strictly positive predictions, `1/N` when none is positive.
pub fn weights_from_predictions(
  tickers: &[String],
  predictions: &PredictionMap,
  config: &EngineConfig,
) -> Result<WeightVector> {
  let positive: Vec<f64> = tickers
    .iter()
    .map(|t| predictions.get(t).copied().unwrap_or(0.0))
    .map(|p| if p > 0.0 { p } else { 0.0 })
    .collect();
  let total: f64 = positive.iter().sum();

  if total <= 0.0 || !total.is_finite() {
    warn!("No positive predicted return; allocating equal weights");
    return Ok(WeightVector::equal(tickers));
  }

  let weights = WeightVector::new(
    tickers.to_vec(),
    positive.iter().map(|p| p / total).collect(),
  )?;
  if config.sums_to_one(weights.sum()) {
    Ok(weights)
  } else {
    Ok(weights.normalized())
  }
}

/// Allocate from the latest feature row and evaluate the weights on historical returns.
///
/// Returns `Ok(None)` when no model covers a portfolio ticker or the feature table is empty.
pub fn optimize_predictive(
  models: &ModelMap,
  features: &FeatureSet,
  returns: &Panel,
  config: &EngineConfig,
) -> Result<Option<Allocation>> {
  let tickers = returns.columns().to_vec();
  if !tickers.iter().any(|t| models.contains_key(t)) {
    warn!("No prediction model for any portfolio ticker; skipping prediction-weighted allocation");
    return Ok(None);
  }
  let Some((date, latest)) = features.latest() else {
    warn!("Feature table is empty; skipping prediction-weighted allocation");
    return Ok(None);
  };

  let predictions = predict_returns(models, &tickers, latest)?;
  info!("Predicted returns as of {}: {:?}", date, predictions);

  let weights = weights_from_predictions(&tickers, &predictions, config)?;
  let performance = evaluate(
    weights.to_array().view(),
    returns,
    config.risk_free_rate,
    config.trading_days,
  )?;

  info!(
    "Prediction-weighted allocation (historical): return {:.4}, volatility {:.4}, sharpe {:.4}",
    performance.annual_return, performance.annual_volatility, performance.sharpe_ratio
  );

  Ok(Some(Allocation {
    method: StrategyKind::MachineLearning,
    weights,
    performance,
    predictions: Some(predictions),
  }))
}
