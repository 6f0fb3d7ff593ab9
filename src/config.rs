//! # Configuration
//!
//! $$
//! \mathrm{SR} = \frac{\mu_p \cdot N - r_f}{\sigma_p \sqrt{N}}, \quad N = 252
//! $$
//!
//! Explicit engine configuration threaded through every component instead of process-wide
//! constants. Every section can be loaded from a partial TOML document.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::error::PortfolioError;
use crate::error::Result;

/// Rolling-window settings for the feature engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
  /// Primary window `W`, used for both return and volatility features.
  pub window: usize,
  /// Forward horizon `T` of the accumulated-return target.
  pub target_window: usize,
  /// Extra rolling-sum return windows besides `window`.
  pub return_windows: Vec<usize>,
  /// Extra rolling volatility windows besides `window`.
  pub vol_windows: Vec<usize>,
  /// Rolling-sum momentum window.
  pub momentum_window: usize,
  /// Window of the benchmark return/volatility features.
  pub market_window: usize,
  /// Headroom reserved for forward targets in the minimum-history check.
  pub target_headroom: usize,
}

impl Default for FeatureConfig {
  fn default() -> Self {
    Self {
      window: 30,
      target_window: 10,
      return_windows: vec![5, 10, 20],
      vol_windows: vec![10, 20],
      momentum_window: 90,
      market_window: 30,
      target_headroom: 30,
    }
  }
}

impl FeatureConfig {
  /// Minimum number of return rows required before any feature is produced.
  pub fn min_history(&self) -> usize {
    self.momentum_window + self.window + self.target_headroom
  }

  /// Return windows in output order, with `window` appended and duplicates removed.
  pub fn all_return_windows(&self) -> Vec<usize> {
    dedup_windows(&self.return_windows, self.window)
  }

  /// Volatility windows in output order, with `window` appended and duplicates removed.
  pub fn all_vol_windows(&self) -> Vec<usize> {
    dedup_windows(&self.vol_windows, self.window)
  }
}

fn dedup_windows(extra: &[usize], primary: usize) -> Vec<usize> {
  let mut out = Vec::with_capacity(extra.len() + 1);
  for &w in extra.iter().chain(std::iter::once(&primary)) {
    if !out.contains(&w) {
      out.push(w);
    }
  }
  out
}

/// Settings of the Nelder-Mead solver used by the mean-variance optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
  /// Iteration cap; reaching it is reported as non-convergence.
  pub max_iters: u64,
  /// Standard-deviation tolerance of simplex costs.
  pub sd_tolerance: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 5000,
      sd_tolerance: 1e-10,
    }
  }
}

/// Runtime configuration for [`crate::engine::PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Annual risk-free rate used in every Sharpe computation.
  pub risk_free_rate: f64,
  /// Trading days per year used for annualization.
  pub trading_days: usize,
  /// Absolute tolerance when checking that weights sum to one.
  pub weight_atol: f64,
  /// Relative tolerance when checking that weights sum to one.
  pub weight_rtol: f64,
  pub features: FeatureConfig,
  pub optimizer: OptimizerConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.02,
      trading_days: 252,
      weight_atol: 1e-8,
      weight_rtol: 1e-5,
      features: FeatureConfig::default(),
      optimizer: OptimizerConfig::default(),
    }
  }
}

impl EngineConfig {
  /// Parse a (possibly partial) TOML document; missing keys keep their defaults.
  pub fn from_toml_str(s: &str) -> Result<Self> {
    let config: Self =
      toml::from_str(s).map_err(|e| PortfolioError::Config(format!("invalid TOML: {e}")))?;
    config.validate()?;
    Ok(config)
  }

  /// Load and validate a TOML configuration file.
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    info!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  /// Reject settings that would make the pipeline meaningless.
  pub fn validate(&self) -> Result<()> {
    if self.trading_days == 0 {
      return Err(PortfolioError::Config("trading_days must be > 0".into()));
    }
    if !self.risk_free_rate.is_finite() {
      return Err(PortfolioError::Config("risk_free_rate must be finite".into()));
    }

    let f = &self.features;
    let windows = f
      .all_return_windows()
      .into_iter()
      .chain([f.momentum_window, f.market_window]);
    if windows.into_iter().any(|w| w == 0) {
      return Err(PortfolioError::Config("rolling windows must be > 0".into()));
    }
    if f.window < 2 || f.market_window < 2 || f.all_vol_windows().iter().any(|&w| w < 2) {
      return Err(PortfolioError::Config(
        "volatility windows must be >= 2".into(),
      ));
    }
    if f.target_window == 0 {
      return Err(PortfolioError::Config("target_window must be > 0".into()));
    }
    if self.optimizer.max_iters == 0 {
      return Err(PortfolioError::Config("optimizer.max_iters must be > 0".into()));
    }
    Ok(())
  }

  /// Numpy-style `isclose(sum, 1.0)` check for weight vectors.
  pub fn sums_to_one(&self, sum: f64) -> bool {
    (sum - 1.0).abs() <= self.weight_atol + self.weight_rtol
  }
}
