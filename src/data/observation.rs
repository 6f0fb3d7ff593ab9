use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;

/// One long-format market data row: a single ticker on a single trading day.
///
/// Missing prices are stored as `NaN` and later filled by the aligner.
#[derive(ImplNew, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
  pub date: NaiveDate,
  pub ticker: String,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  /// Adjusted close used by every downstream computation.
  pub close: f64,
  pub volume: f64,
}

impl RawObservation {
  /// Row carrying only a closing price; other fields are `NaN`.
  pub fn close_only(date: NaiveDate, ticker: impl Into<String>, close: f64) -> Self {
    Self {
      date,
      ticker: ticker.into(),
      open: f64::NAN,
      high: f64::NAN,
      low: f64::NAN,
      close,
      volume: f64::NAN,
    }
  }
}
