//! # Time-Series Alignment
//!
//! $$
//! r_{t,j} = \frac{P_{t,j}}{P_{t-1,j}} - 1
//! $$
//!
//! Pivot long-format observations into a wide, gap-filled price matrix and derive daily
//! returns. Caller-supplied observations are never mutated.

use std::collections::BTreeSet;
use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::info;

use super::observation::RawObservation;
use super::panel::Panel;
use super::panel::Series;
use crate::error::PortfolioError;
use crate::error::Result;

/// Aligned history owned by one optimizer session.
#[derive(Clone, Debug)]
pub struct AlignedData {
  /// Portfolio tickers in canonical order.
  pub tickers: Vec<String>,
  pub benchmark: String,
  /// Gap-filled closes, portfolio tickers followed by the benchmark.
  pub prices: Panel,
  /// Daily returns over the same columns, one row shorter than `prices`.
  pub returns: Panel,
  /// Daily returns of the benchmark alone.
  pub benchmark_returns: Series,
  /// Daily returns restricted to portfolio tickers.
  pub portfolio_returns: Panel,
}

/// Build the price matrix, return matrix and benchmark returns.
///
/// Portfolio tickers keep the order given in `tickers` (duplicates dropped); the benchmark is the
/// last column.
pub fn align(
  observations: &[RawObservation],
  tickers: &[String],
  benchmark: &str,
) -> Result<AlignedData> {
  let mut portfolio: Vec<String> = Vec::with_capacity(tickers.len());
  for t in tickers {
    if !portfolio.contains(t) {
      portfolio.push(t.clone());
    }
  }
  if portfolio.is_empty() {
    return Err(PortfolioError::DataNotFound("no portfolio tickers requested".into()));
  }
  let tickers = portfolio.as_slice();

  let mut columns: Vec<String> = portfolio.clone();
  if !columns.iter().any(|c| c == benchmark) {
    columns.push(benchmark.to_string());
  }

  let relevant: Vec<&RawObservation> = observations
    .iter()
    .filter(|o| columns.iter().any(|c| *c == o.ticker))
    .collect();
  if relevant.is_empty() {
    return Err(PortfolioError::DataNotFound(
      "no observations left after filtering to the requested tickers".into(),
    ));
  }

  let present: BTreeSet<&str> = relevant.iter().map(|o| o.ticker.as_str()).collect();
  if !present.contains(benchmark) {
    return Err(PortfolioError::DataNotFound(format!(
      "benchmark ticker '{benchmark}' not found in data"
    )));
  }
  let missing: Vec<&str> = tickers
    .iter()
    .map(String::as_str)
    .filter(|t| !present.contains(t))
    .collect();
  if !missing.is_empty() {
    return Err(PortfolioError::DataNotFound(format!(
      "portfolio tickers not found in data: {}",
      missing.join(", ")
    )));
  }

  let dates: Vec<NaiveDate> = relevant
    .iter()
    .map(|o| o.date)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();
  let row_of: HashMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
  let col_of: HashMap<&str, usize> = columns
    .iter()
    .enumerate()
    .map(|(j, c)| (c.as_str(), j))
    .collect();

  let mut values = Array2::from_elem((dates.len(), columns.len()), f64::NAN);
  let mut seen = vec![false; dates.len() * columns.len()];
  for o in &relevant {
    let i = row_of[&o.date];
    let j = col_of[o.ticker.as_str()];
    if std::mem::replace(&mut seen[i * columns.len() + j], true) {
      return Err(PortfolioError::Schema(format!(
        "duplicate observation for '{}' on {}",
        o.ticker, o.date
      )));
    }
    values[[i, j]] = if o.close.is_finite() { o.close } else { f64::NAN };
  }

  fill_forward_backward(&mut values);

  if values.iter().all(|v| v.is_nan()) {
    return Err(PortfolioError::InsufficientData(
      "price matrix is entirely undefined after gap filling".into(),
    ));
  }
  if let Some(j) = (0..columns.len()).find(|&j| values.column(j).iter().all(|v| v.is_nan())) {
    return Err(PortfolioError::InsufficientData(format!(
      "no valid closing price for '{}'",
      columns[j]
    )));
  }

  let prices = Panel::new(dates, columns, values)?;
  let returns = prices.pct_change();
  if returns.is_empty() {
    return Err(PortfolioError::InsufficientData(
      "at least two dates with defined returns are required".into(),
    ));
  }

  let benchmark_returns = returns
    .series(benchmark)
    .ok_or_else(|| PortfolioError::DataNotFound(format!("benchmark '{benchmark}' not aligned")))?;
  let portfolio_returns = returns.select(tickers)?;

  if let (Some(first), Some(last)) = (prices.first_date(), prices.last_date()) {
    info!(
      "Loaded prices from {} to {} ({} trading days)",
      first,
      last,
      prices.n_rows()
    );
  }
  info!("Portfolio tickers: {}", tickers.join(", "));
  info!("Benchmark: {}", benchmark);

  Ok(AlignedData {
    tickers: tickers.to_vec(),
    benchmark: benchmark.to_string(),
    prices,
    returns,
    benchmark_returns,
    portfolio_returns,
  })
}

/// Carry the last known value forward, then backfill leading gaps, column by column.
fn fill_forward_backward(values: &mut Array2<f64>) {
  for mut col in values.columns_mut() {
    let mut last = f64::NAN;
    for v in col.iter_mut() {
      if v.is_nan() {
        *v = last;
      } else {
        last = *v;
      }
    }

    let mut next = f64::NAN;
    for v in col.iter_mut().rev() {
      if v.is_nan() {
        *v = next;
      } else {
        next = *v;
      }
    }
  }
}
