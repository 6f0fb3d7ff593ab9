//! Ingestion from a polars `DataFrame` holding the long-format table.

use polars::prelude::*;

use super::ingest::parse_date;
use super::ingest::REQUIRED_COLUMNS;
use super::observation::RawObservation;
use crate::error::PortfolioError;
use crate::error::Result;

fn find_column(df: &DataFrame, name: &str) -> Option<String> {
  df.get_columns()
    .iter()
    .map(|s| s.name().to_string())
    .find(|c| c.trim().eq_ignore_ascii_case(name))
}

fn float_column(df: &DataFrame, name: Option<&String>, height: usize) -> Result<Vec<f64>> {
  match name {
    Some(name) => {
      let casted = df.column(name.as_str())?.cast(&DataType::Float64)?;
      Ok(
        casted
          .f64()?
          .into_iter()
          .map(|v| v.unwrap_or(f64::NAN))
          .collect(),
      )
    }
    None => Ok(vec![f64::NAN; height]),
  }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
  let casted = df.column(name)?.cast(&DataType::String)?;
  Ok(
    casted
      .str()?
      .into_iter()
      .map(|v| v.map(str::to_string))
      .collect(),
  )
}

/// Convert a long-format frame (`date`, `ticker`, `close`, optional OHLV) into observations.
pub fn observations_from_dataframe(df: &DataFrame) -> Result<Vec<RawObservation>> {
  let missing: Vec<&str> = REQUIRED_COLUMNS
    .iter()
    .copied()
    .filter(|c| find_column(df, c).is_none())
    .collect();
  if !missing.is_empty() {
    return Err(PortfolioError::Schema(format!(
      "table must contain columns {}; missing {}",
      REQUIRED_COLUMNS.join(", "),
      missing.join(", ")
    )));
  }

  let height = df.height();
  let lookup = |name: &str| find_column(df, name);
  let date_col = lookup("date").unwrap_or_default();
  let ticker_col = lookup("ticker").unwrap_or_default();

  let dates = string_column(df, &date_col)?;
  let tickers = string_column(df, &ticker_col)?;
  let close = float_column(df, lookup("close").as_ref(), height)?;
  let open = float_column(df, lookup("open").as_ref(), height)?;
  let high = float_column(df, lookup("high").as_ref(), height)?;
  let low = float_column(df, lookup("low").as_ref(), height)?;
  let volume = float_column(df, lookup("volume").as_ref(), height)?;

  let mut rows = Vec::with_capacity(height);
  for i in 0..height {
    let (Some(date), Some(ticker)) = (&dates[i], &tickers[i]) else {
      continue;
    };
    rows.push(RawObservation {
      date: parse_date(date)?,
      ticker: ticker.clone(),
      open: open[i],
      high: high[i],
      low: low[i],
      close: close[i],
      volume: volume[i],
    });
  }
  Ok(rows)
}
