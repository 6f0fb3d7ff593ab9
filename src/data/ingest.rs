//! Long-format CSV ingestion (`Date,Open,High,Low,Close,Volume,ticker`).

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use csv::StringRecord;
use tracing::debug;
use tracing::info;

use super::observation::RawObservation;
use crate::error::PortfolioError;
use crate::error::Result;

/// Columns every long-format table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["date", "close", "ticker"];

struct ColumnMap {
  date: usize,
  ticker: usize,
  close: usize,
  open: Option<usize>,
  high: Option<usize>,
  low: Option<usize>,
  volume: Option<usize>,
}

impl ColumnMap {
  fn from_headers(headers: &StringRecord) -> Result<Self> {
    let find = |name: &str| {
      headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let missing: Vec<&str> = REQUIRED_COLUMNS
      .iter()
      .copied()
      .filter(|c| find(c).is_none())
      .collect();
    if !missing.is_empty() {
      return Err(PortfolioError::Schema(format!(
        "table must contain columns {}; missing {}",
        REQUIRED_COLUMNS.join(", "),
        missing.join(", ")
      )));
    }

    Ok(Self {
      date: find("date").unwrap_or_default(),
      ticker: find("ticker").unwrap_or_default(),
      close: find("close").unwrap_or_default(),
      open: find("open"),
      high: find("high"),
      low: find("low"),
      volume: find("volume"),
    })
  }
}

/// Parse `YYYY-MM-DD`, ignoring any time or offset suffix.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
  let raw = raw.trim();
  let head = raw.get(..10).unwrap_or(raw);
  NaiveDate::parse_from_str(head, "%Y-%m-%d")
    .map_err(|e| PortfolioError::Schema(format!("invalid date '{raw}': {e}")))
}

fn parse_price(record: &StringRecord, idx: Option<usize>) -> f64 {
  idx
    .and_then(|i| record.get(i))
    .and_then(|s| s.trim().parse::<f64>().ok())
    .unwrap_or(f64::NAN)
}

/// Read observations from any CSV source with a header row.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<RawObservation>> {
  let mut rdr = ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(reader);

  let columns = ColumnMap::from_headers(rdr.headers()?)?;
  let mut rows = Vec::new();
  let mut skipped = 0usize;

  for record in rdr.records() {
    let record = record?;
    let ticker = record.get(columns.ticker).unwrap_or_default();
    let date = record.get(columns.date).unwrap_or_default();
    if ticker.is_empty() || date.is_empty() {
      skipped += 1;
      continue;
    }

    rows.push(RawObservation {
      date: parse_date(date)?,
      ticker: ticker.to_string(),
      open: parse_price(&record, columns.open),
      high: parse_price(&record, columns.high),
      low: parse_price(&record, columns.low),
      close: parse_price(&record, Some(columns.close)),
      volume: parse_price(&record, columns.volume),
    });
  }

  if skipped > 0 {
    debug!("Skipped {} rows without date or ticker", skipped);
  }
  Ok(rows)
}

/// Load the long-format base file from disk.
pub fn load_observations(path: impl AsRef<Path>) -> Result<Vec<RawObservation>> {
  let path = path.as_ref();
  info!("Loading observations from {}", path.display());
  let file = std::fs::File::open(path)?;
  let rows = read_observations(file)?;
  info!("Loaded {} observations", rows.len());
  Ok(rows)
}
