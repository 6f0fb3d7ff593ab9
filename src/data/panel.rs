//! # Panel
//!
//! $$
//! X \in \mathbb R^{T \times N}, \quad X_{t,j} = \text{value of column } j \text{ on date } t
//! $$
//!
//! Dense date-indexed matrices. A [`Panel`] keeps a strictly increasing date index, a column
//! key per matrix column and one contiguous row-major buffer, so alignment invariants can be
//! asserted directly.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::PortfolioError;
use crate::error::Result;

/// Date × column matrix (prices, returns, features or targets).
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
  dates: Vec<NaiveDate>,
  columns: Vec<String>,
  values: Array2<f64>,
}

impl Panel {
  /// Build a panel, checking shape and that dates are strictly increasing.
  pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if values.nrows() != dates.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: dates.len(),
        actual: values.nrows(),
      });
    }
    if values.ncols() != columns.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: columns.len(),
        actual: values.ncols(),
      });
    }
    if dates.windows(2).any(|w| w[0] >= w[1]) {
      return Err(PortfolioError::Schema(
        "date index must be sorted and unique".into(),
      ));
    }

    Ok(Self {
      dates,
      columns,
      values,
    })
  }

  /// Panel with no rows over the given columns.
  pub fn empty(columns: Vec<String>) -> Self {
    let n = columns.len();
    Self {
      dates: Vec::new(),
      columns,
      values: Array2::zeros((0, n)),
    }
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn n_rows(&self) -> usize {
    self.dates.len()
  }

  pub fn n_cols(&self) -> usize {
    self.columns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn first_date(&self) -> Option<NaiveDate> {
    self.dates.first().copied()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }

  /// Borrow one column by key.
  pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .column_index(name)
      .map(|j| self.values.column(j))
  }

  /// Copy one column out as an independently owned series.
  pub fn series(&self, name: &str) -> Option<Series> {
    self.column(name).map(|col| Series {
      dates: self.dates.clone(),
      values: col.to_owned(),
    })
  }

  /// Borrow the row at position `i`.
  pub fn row(&self, i: usize) -> Option<ArrayView1<'_, f64>> {
    (i < self.n_rows()).then(|| self.values.row(i))
  }

  /// New panel restricted to `names`, in that order.
  pub fn select(&self, names: &[String]) -> Result<Self> {
    let idx = names
      .iter()
      .map(|name| {
        self
          .column_index(name)
          .ok_or_else(|| PortfolioError::DataNotFound(format!("column '{name}' not present")))
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      dates: self.dates.clone(),
      columns: names.to_vec(),
      values: self.values.select(Axis(1), &idx),
    })
  }

  /// New panel holding the rows at `rows` (positions, increasing).
  pub fn take_rows(&self, rows: &[usize]) -> Self {
    Self {
      dates: rows.iter().map(|&i| self.dates[i]).collect(),
      columns: self.columns.clone(),
      values: self.values.select(Axis(0), rows),
    }
  }

  /// Rows whose date lies in `[start, end]`; `None` leaves that side open.
  pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
    let rows = date_positions(&self.dates, start, end);
    self.take_rows(&rows)
  }

  /// Day-over-day simple returns. The undefined leading row is dropped, and so is any row
  /// with a non-finite return (a zero or missing previous price).
  pub fn pct_change(&self) -> Self {
    if self.n_rows() < 2 {
      return Self::empty(self.columns.clone());
    }

    let prev = self.values.slice(ndarray::s![..-1, ..]);
    let next = self.values.slice(ndarray::s![1.., ..]);
    let values = &next / &prev - 1.0;

    let keep: Vec<usize> = values
      .axis_iter(Axis(0))
      .enumerate()
      .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
      .map(|(i, _)| i)
      .collect();

    Self {
      dates: keep.iter().map(|&i| self.dates[i + 1]).collect(),
      columns: self.columns.clone(),
      values: values.select(Axis(0), &keep),
    }
  }
}

/// Single date-indexed column owned independently of its source panel.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
  dates: Vec<NaiveDate>,
  values: Array1<f64>,
}

impl Series {
  pub fn new(dates: Vec<NaiveDate>, values: Array1<f64>) -> Result<Self> {
    if dates.len() != values.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: dates.len(),
        actual: values.len(),
      });
    }
    Ok(Self { dates, values })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn values(&self) -> ArrayView1<'_, f64> {
    self.values.view()
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn last(&self) -> Option<f64> {
    self.values.last().copied()
  }

  pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
    let rows = date_positions(&self.dates, start, end);
    Self {
      dates: rows.iter().map(|&i| self.dates[i]).collect(),
      values: self.values.select(Axis(0), &rows),
    }
  }

  /// Conform to `dates`, filling dates absent from this series with `fill`.
  pub fn reindex(&self, dates: &[NaiveDate], fill: f64) -> Self {
    let values = dates
      .iter()
      .map(|d| match self.dates.binary_search(d) {
        Ok(i) => self.values[i],
        Err(_) => fill,
      })
      .collect::<Array1<f64>>();

    Self {
      dates: dates.to_vec(),
      values,
    }
  }

  /// Ordered `(date, value)` pairs for serialization.
  pub fn points(&self) -> Vec<(NaiveDate, f64)> {
    self
      .dates
      .iter()
      .copied()
      .zip(self.values.iter().copied())
      .collect()
  }
}

fn date_positions(
  dates: &[NaiveDate],
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Vec<usize> {
  dates
    .iter()
    .enumerate()
    .filter(|(_, d)| start.map_or(true, |s| **d >= s) && end.map_or(true, |e| **d <= e))
    .map(|(i, _)| i)
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
  }

  fn prices() -> Panel {
    Panel::new(
      vec![day(2), day(3), day(4)],
      vec!["AAA".into(), "BBB".into()],
      array![[100.0, 10.0], [110.0, 10.0], [99.0, 12.0]],
    )
    .unwrap()
  }

  #[test]
  fn pct_change_drops_first_row_and_keeps_columns() {
    let p = prices();
    let r = p.pct_change();

    assert_eq!(r.n_rows(), p.n_rows() - 1);
    assert_eq!(r.columns(), p.columns());
    assert_eq!(r.dates(), &[day(3), day(4)]);
    assert_abs_diff_eq!(r.values()[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[1, 0]], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[1, 1]], 0.2, epsilon = 1e-12);
  }

  #[test]
  fn pct_change_drops_undefined_rows() {
    let p = Panel::new(
      vec![day(2), day(3), day(4), day(5)],
      vec!["AAA".into(), "BBB".into()],
      array![[0.0, 10.0], [0.0, 11.0], [2.0, 12.0], [3.0, 13.0]],
    )
    .unwrap();
    let r = p.pct_change();

    // 0/0 on day 3 and 2/0 on day 4 leave only day 5
    assert_eq!(r.dates(), &[day(5)]);
    assert_eq!(r.columns(), p.columns());
    assert!(r.values().iter().all(|v| v.is_finite()));
    assert_abs_diff_eq!(r.values()[[0, 0]], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[0, 1]], 1.0 / 12.0, epsilon = 1e-12);
  }

  #[test]
  fn rejects_unsorted_dates() {
    let err = Panel::new(
      vec![day(3), day(2)],
      vec!["AAA".into()],
      array![[1.0], [2.0]],
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::Schema(_)));
  }

  #[test]
  fn select_reorders_and_reports_missing() {
    let p = prices();
    let s = p.select(&["BBB".into(), "AAA".into()]).unwrap();
    assert_eq!(s.columns(), &["BBB".to_string(), "AAA".to_string()]);
    assert_eq!(s.values()[[2, 0]], 12.0);

    let err = p.select(&["ZZZ".into()]).unwrap_err();
    assert!(matches!(err, PortfolioError::DataNotFound(_)));
  }

  #[test]
  fn between_is_inclusive() {
    let p = prices();
    assert_eq!(p.between(Some(day(3)), None).dates(), &[day(3), day(4)]);
    assert_eq!(p.between(None, Some(day(3))).dates(), &[day(2), day(3)]);
    assert!(p.between(Some(day(5)), None).is_empty());
  }

  #[test]
  fn reindex_fills_missing_dates() {
    let s = Series::new(vec![day(2), day(4)], array![0.01, 0.02]).unwrap();
    let r = s.reindex(&[day(2), day(3), day(4)], 0.0);

    assert_eq!(r.points(), vec![(day(2), 0.01), (day(3), 0.0), (day(4), 0.02)]);
  }
}
