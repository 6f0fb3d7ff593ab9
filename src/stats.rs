//! # Stats
//!
//! $$
//! s = \sqrt{\frac{1}{n-1}\sum_{i=1}^{n}(x_i-\bar x)^2}
//! $$
//!
//! Sample statistics and rolling-window helpers over dense `ndarray` buffers.
//! Sample moments use `ddof = 1`; incomplete rolling windows are `NaN`.

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use statrs::statistics::Statistics;

/// Volatilities at or below this level are treated as exactly zero.
pub const VOL_EPSILON: f64 = 1e-12;

/// Arithmetic mean, `0.0` for an empty input.
pub fn mean(xs: ArrayView1<'_, f64>) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().mean()
  }
}

/// Sample standard deviation, `0.0` when fewer than two observations exist.
pub fn sample_std(xs: ArrayView1<'_, f64>) -> f64 {
  if xs.len() < 2 {
    0.0
  } else {
    xs.iter().std_dev()
  }
}

/// Per-column means of an observations × variables matrix.
pub fn column_means(values: ArrayView2<'_, f64>) -> Array1<f64> {
  values
    .mean_axis(Axis(0))
    .unwrap_or_else(|| Array1::zeros(values.ncols()))
}

/// Sample covariance of an observations × variables matrix.
///
/// Fewer than two observations yield a zero matrix rather than a division by zero.
pub fn covariance(values: ArrayView2<'_, f64>) -> Array2<f64> {
  let n_vars = values.ncols();
  if values.nrows() < 2 || n_vars == 0 {
    return Array2::zeros((n_vars, n_vars));
  }

  values
    .t()
    .cov(1.0)
    .unwrap_or_else(|_| Array2::zeros((n_vars, n_vars)))
}

/// Trailing rolling sum; the first `window - 1` entries are `NaN`.
pub fn rolling_sum(xs: ArrayView1<'_, f64>, window: usize) -> Array1<f64> {
  rolling_apply(xs, window, |w| w.sum())
}

/// Trailing rolling sample standard deviation; incomplete windows are `NaN`.
pub fn rolling_std(xs: ArrayView1<'_, f64>, window: usize) -> Array1<f64> {
  if window < 2 {
    return Array1::from_elem(xs.len(), f64::NAN);
  }
  rolling_apply(xs, window, |w| w.iter().std_dev())
}

fn rolling_apply<F>(xs: ArrayView1<'_, f64>, window: usize, f: F) -> Array1<f64>
where
  F: Fn(ArrayView1<'_, f64>) -> f64,
{
  let n = xs.len();
  let mut out = Array1::from_elem(n, f64::NAN);
  if window == 0 || window > n {
    return out;
  }

  for i in (window - 1)..n {
    out[i] = f(xs.slice(s![i + 1 - window..=i]));
  }
  out
}

/// Sharpe ratio with the zero-volatility convention.
pub fn sharpe_ratio(annual_return: f64, annual_vol: f64, risk_free: f64) -> f64 {
  if annual_vol.abs() <= VOL_EPSILON || !annual_vol.is_finite() {
    0.0
  } else {
    (annual_return - risk_free) / annual_vol
  }
}
