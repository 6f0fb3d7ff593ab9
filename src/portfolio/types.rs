//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for allocation strategies.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;
use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

use crate::error::PortfolioError;
use crate::error::Result;

/// Supported allocation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
  /// Sharpe-maximizing mean-variance allocation on the long-only simplex.
  MeanVariance,
  /// Weights proportional to positive predicted returns.
  MachineLearning,
}

impl StrategyKind {
  /// Parse a strategy name, defaulting to mean-variance.
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "ml" | "machine-learning" | "machinelearning" | "predictive" => Self::MachineLearning,
      _ => Self::MeanVariance,
    }
  }
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StrategyKind::MeanVariance => write!(f, "Markowitz"),
      StrategyKind::MachineLearning => write!(f, "Machine Learning"),
    }
  }
}

/// Ticker → non-negative weight, in canonical ticker order.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector {
  tickers: Vec<String>,
  weights: Vec<f64>,
}

impl WeightVector {
  /// Pair tickers with weights; lengths must match and weights must be non-negative.
  pub fn new(tickers: Vec<String>, weights: Vec<f64>) -> Result<Self> {
    if tickers.len() != weights.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: tickers.len(),
        actual: weights.len(),
      });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
      return Err(PortfolioError::Schema(
        "weights must be finite and non-negative".into(),
      ));
    }
    Ok(Self { tickers, weights })
  }

  /// `1/N` on every ticker.
  pub fn equal(tickers: &[String]) -> Self {
    let n = tickers.len();
    let w = if n > 0 { 1.0 / n as f64 } else { 0.0 };
    Self {
      tickers: tickers.to_vec(),
      weights: vec![w; n],
    }
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn weights(&self) -> &[f64] {
    &self.weights
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }

  pub fn get(&self, ticker: &str) -> Option<f64> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.weights[i])
  }

  pub fn sum(&self) -> f64 {
    self.weights.iter().sum()
  }

  pub fn to_array(&self) -> Array1<f64> {
    Array1::from(self.weights.clone())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .tickers
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }

  /// Rescale uniformly so the weights sum to one; a zero sum is left untouched.
  pub fn normalized(mut self) -> Self {
    let total = self.sum();
    if total > 0.0 {
      for w in &mut self.weights {
        *w /= total;
      }
    }
    self
  }
}

impl Serialize for WeightVector {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.len()))?;
    for (ticker, w) in self.iter() {
      map.serialize_entry(ticker, &w)?;
    }
    map.end()
  }
}

/// Ticker → predicted forward return.
pub type PredictionMap = BTreeMap<String, f64>;

/// Annualized historical performance of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Performance {
  /// `Σ(mean_i · w_i) · N`.
  pub annual_return: f64,
  /// `sqrt(wᵀ Σ N w)`.
  pub annual_volatility: f64,
  /// `(annual_return − r_f) / annual_volatility`, zero without volatility.
  pub sharpe_ratio: f64,
}

/// Output of one allocation strategy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Allocation {
  pub method: StrategyKind,
  pub weights: WeightVector,
  /// Historical performance of `weights`, not a model forecast.
  pub performance: Performance,
  /// Predictions that produced the weights (prediction-weighted strategy only).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub predictions: Option<PredictionMap>,
}
