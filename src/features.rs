//! # Features
//!
//! $$
//! x^{\text{ret}}_{t,w} = \sum_{s=t-w+1}^{t} r_s, \qquad
//! y_t = \sum_{s=t+1}^{t+T} r_s
//! $$
//!
//! Rolling-window return, volatility and momentum features per asset, benchmark features and
//! the forward accumulated-return targets that drive prediction-weighted allocation.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use tracing::info;
use tracing::warn;

use crate::config::FeatureConfig;
use crate::data::Panel;
use crate::data::Series;
use crate::stats::rolling_std;
use crate::stats::rolling_sum;

/// Feature table and targets sharing one date index.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
  /// One row per date, columns keyed `{ticker}_{feature}_{window}d` plus `market_*`.
  pub features: Panel,
  /// Forward accumulated returns, one column per portfolio ticker.
  pub targets: Panel,
}

impl FeatureSet {
  fn empty(feature_columns: Vec<String>, tickers: Vec<String>) -> Self {
    Self {
      features: Panel::empty(feature_columns),
      targets: Panel::empty(tickers),
    }
  }

  /// `true` when history was insufficient; features and targets are then both empty.
  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  /// Most recent feature row, the input of every prediction.
  pub fn latest(&self) -> Option<(NaiveDate, ArrayView1<'_, f64>)> {
    let last = self.features.n_rows().checked_sub(1)?;
    Some((self.features.dates()[last], self.features.row(last)?))
  }

  /// Target series of one ticker.
  pub fn target(&self, ticker: &str) -> Option<Series> {
    self.targets.series(ticker)
  }
}

/// Feature column names in output order.
pub fn feature_columns(tickers: &[String], config: &FeatureConfig) -> Vec<String> {
  let mut names = Vec::new();
  for ticker in tickers {
    for w in config.all_return_windows() {
      names.push(format!("{ticker}_return_{w}d"));
    }
    for w in config.all_vol_windows() {
      names.push(format!("{ticker}_vol_{w}d"));
    }
    names.push(format!("{ticker}_momentum_{}d", config.momentum_window));
  }
  names.push(format!("market_return_{}d", config.market_window));
  names.push(format!("market_vol_{}d", config.market_window));
  names
}

/// Derive features and forward targets from portfolio returns and benchmark returns.
///
/// Returns an empty [`FeatureSet`] when fewer than [`FeatureConfig::min_history`] rows exist
/// or when no date survives window warm-up and target trimming.
pub fn build_features(returns: &Panel, benchmark: &Series, config: &FeatureConfig) -> FeatureSet {
  let tickers = returns.columns().to_vec();
  let columns = feature_columns(&tickers, config);
  let n = returns.n_rows();

  if n < config.min_history() {
    warn!(
      "Insufficient return history ({} days) for features; {} days required",
      n,
      config.min_history()
    );
    return FeatureSet::empty(columns, tickers);
  }

  let values = returns.values();
  let mut raw: Vec<Array1<f64>> = Vec::with_capacity(columns.len());
  for j in 0..returns.n_cols() {
    let r = values.column(j);
    for w in config.all_return_windows() {
      raw.push(rolling_sum(r, w));
    }
    for w in config.all_vol_windows() {
      raw.push(rolling_std(r, w));
    }
    raw.push(rolling_sum(r, config.momentum_window));
  }

  let market = benchmark.reindex(returns.dates(), f64::NAN);
  raw.push(rolling_sum(market.values(), config.market_window));
  raw.push(rolling_std(market.values(), config.market_window));

  let mut features = Array2::from_elem((n, columns.len()), f64::NAN);
  for (k, col) in raw.iter().enumerate() {
    features.column_mut(k).assign(col);
  }

  let horizon = config.target_window;
  let mut targets = Array2::from_elem((n, tickers.len()), f64::NAN);
  for j in 0..returns.n_cols() {
    let forward = rolling_sum(values.column(j), horizon);
    for t in 0..n.saturating_sub(horizon) {
      targets[[t, j]] = forward[t + horizon];
    }
  }

  let keep: Vec<usize> = (0..n)
    .filter(|&t| {
      features.row(t).iter().all(|v| !v.is_nan()) && targets.row(t).iter().all(|v| !v.is_nan())
    })
    .collect();

  if keep.is_empty() {
    warn!("No date has complete features and defined targets");
    return FeatureSet::empty(columns, tickers);
  }

  let dates: Vec<NaiveDate> = keep.iter().map(|&t| returns.dates()[t]).collect();
  let features = features.select(Axis(0), &keep);
  let targets = targets.select(Axis(0), &keep);

  let set = match (
    Panel::new(dates.clone(), columns.clone(), features),
    Panel::new(dates, tickers.clone(), targets),
  ) {
    (Ok(features), Ok(targets)) => FeatureSet { features, targets },
    _ => return FeatureSet::empty(columns, tickers),
  };

  info!(
    "Prepared features: {} rows x {} columns, {} targets",
    set.features.n_rows(),
    set.features.n_cols(),
    set.targets.n_cols()
  );
  set
}
