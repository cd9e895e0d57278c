//! # Price History
//!
//! $$
//! P_{t,i}\ \text{kept} \iff \forall j:\ P_{t,j}\ \text{observed}
//! $$
//!
//! Inner-join alignment of per-instrument closes on a common date index.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::DateSpan;
use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum number of aligned price observations.
pub const MIN_OBSERVATIONS: usize = 2;

/// Raw provider output: one row per date, `None` marks a missing close.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
  pub instruments: Vec<String>,
  pub dates: Vec<NaiveDate>,
  pub rows: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
  pub fn new(
    instruments: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
  ) -> Result<Self> {
    if dates.len() != rows.len() {
      return Err(PortfolioError::DimensionMismatch {
        field: "price table rows".into(),
        expected: dates.len(),
        actual: rows.len(),
      });
    }
    for row in &rows {
      if row.len() != instruments.len() {
        return Err(PortfolioError::DimensionMismatch {
          field: "price table columns".into(),
          expected: instruments.len(),
          actual: row.len(),
        });
      }
    }

    Ok(Self {
      instruments,
      dates,
      rows,
    })
  }

  /// Dense table without missing values.
  pub fn from_dense(
    instruments: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
  ) -> Result<Self> {
    let rows = rows
      .into_iter()
      .map(|row| row.into_iter().map(Some).collect())
      .collect();
    Self::new(instruments, dates, rows)
  }

  pub fn column_index(&self, instrument: &str) -> Option<usize> {
    self.instruments.iter().position(|s| s == instrument)
  }
}

/// Close prices of a single instrument, as returned by per-symbol vendors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSeries {
  pub instrument: String,
  pub observations: Vec<(NaiveDate, f64)>,
}

/// Aligned, strictly positive close prices (rows = dates, columns = instruments).
#[derive(Clone, Debug, PartialEq)]
pub struct PriceHistory {
  instruments: Vec<String>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
}

impl PriceHistory {
  /// Inner-join a raw table: rows holding any missing or non-finite close are
  /// dropped, the remainder is sorted by date and validated.
  pub fn from_table(table: &PriceTable) -> Result<Self> {
    let n = table.instruments.len();
    let mut kept: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for (date, row) in table.dates.iter().zip(table.rows.iter()) {
      let closes: Option<Vec<f64>> = row
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
      match closes {
        Some(closes) if closes.len() == n => kept.push((*date, closes)),
        _ => dropped += 1,
      }
    }

    if dropped > 0 {
      warn!(
        dropped,
        kept = kept.len(),
        "dropped price rows with missing closes"
      );
    }

    kept.sort_by_key(|(date, _)| *date);
    let dates: Vec<NaiveDate> = kept.iter().map(|(d, _)| *d).collect();
    let flat: Vec<f64> = kept.into_iter().flat_map(|(_, row)| row).collect();
    let prices = Array2::from_shape_vec((dates.len(), n), flat).map_err(|_| {
      PortfolioError::DimensionMismatch {
        field: "price matrix".into(),
        expected: dates.len() * n,
        actual: table.rows.iter().map(|r| r.len()).sum(),
      }
    })?;

    Self::new(table.instruments.clone(), dates, prices)
  }

  /// Inner-join per-instrument series on their common dates.
  pub fn align(series: &[InstrumentSeries]) -> Result<Self> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    let n = series.len();

    for (i, s) in series.iter().enumerate() {
      for (date, close) in &s.observations {
        by_date.entry(*date).or_insert_with(|| vec![None; n])[i] = Some(*close);
      }
    }

    let instruments = series.iter().map(|s| s.instrument.clone()).collect();
    let (dates, rows): (Vec<_>, Vec<_>) = by_date.into_iter().unzip();
    let table = PriceTable::new(instruments, dates, rows)?;
    Self::from_table(&table)
  }

  /// Build from an already dense matrix.
  pub fn new(instruments: Vec<String>, dates: Vec<NaiveDate>, prices: Array2<f64>) -> Result<Self> {
    let (t, n) = prices.dim();
    if n != instruments.len() {
      return Err(PortfolioError::DimensionMismatch {
        field: "price columns".into(),
        expected: instruments.len(),
        actual: n,
      });
    }
    if t != dates.len() {
      return Err(PortfolioError::DimensionMismatch {
        field: "price dates".into(),
        expected: t,
        actual: dates.len(),
      });
    }
    if n == 0 || t < MIN_OBSERVATIONS {
      return Err(PortfolioError::InsufficientData {
        instruments,
        observations: t,
        required: MIN_OBSERVATIONS,
        span: span_of(&dates),
      });
    }

    for ((row, col), &value) in prices.indexed_iter() {
      if !(value.is_finite() && value > 0.0) {
        return Err(PortfolioError::InvalidPrice {
          instrument: instruments[col].clone(),
          date: dates[row],
          value,
        });
      }
    }

    debug!(instruments = n, observations = t, "aligned price history");

    Ok(Self {
      instruments,
      dates,
      prices,
    })
  }

  pub fn instruments(&self) -> &[String] {
    &self.instruments
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn prices(&self) -> ArrayView2<'_, f64> {
    self.prices.view()
  }

  /// Closes of one instrument.
  pub fn column(&self, instrument: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .instruments
      .iter()
      .position(|s| s == instrument)
      .map(|i| self.prices.column(i))
  }

  pub fn n_instruments(&self) -> usize {
    self.instruments.len()
  }

  pub fn n_observations(&self) -> usize {
    self.dates.len()
  }

  pub fn span(&self) -> Option<DateSpan> {
    span_of(&self.dates)
  }
}

pub(crate) fn span_of(dates: &[NaiveDate]) -> Option<DateSpan> {
  match (dates.first(), dates.last()) {
    (Some(start), Some(end)) => Some(DateSpan {
      start: *start,
      end: *end,
    }),
    _ => None,
  }
}
