//! # Price History Providers
//!
//! $$
//! \text{fetch}:\ (\{\text{id}_i\},\ [t_0,t_1]) \mapsto \{P_{t,i}\ \text{or missing}\}
//! $$
//!
//! Retrieval happens strictly before any statistic is computed. Vendors are
//! plugged in behind [`PriceHistoryProvider`]; the crate ships an in-memory
//! table and a CSV reader.

use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::history::PriceHistory;
use super::history::PriceTable;
use crate::error::PortfolioError;
use crate::error::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional inclusive date bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: Option<NaiveDate>,
  pub end: Option<NaiveDate>,
}

impl DateRange {
  pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
    Self { start, end }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
  }
}

/// Source of aligned close prices.
pub trait PriceHistoryProvider {
  /// Closes for `instruments` (all known instruments when empty) within `range`.
  fn fetch(&self, instruments: &[String], range: &DateRange) -> Result<PriceTable>;

  /// Fetch and inner-join into a validated history.
  fn history(&self, instruments: &[String], range: &DateRange) -> Result<PriceHistory> {
    let table = self.fetch(instruments, range)?;
    PriceHistory::from_table(&table)
  }
}

/// Provider over a table held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPriceProvider {
  table: PriceTable,
}

impl InMemoryPriceProvider {
  pub fn new(table: PriceTable) -> Self {
    Self { table }
  }
}

impl PriceHistoryProvider for InMemoryPriceProvider {
  fn fetch(&self, instruments: &[String], range: &DateRange) -> Result<PriceTable> {
    select(&self.table, instruments, range)
  }
}

/// Reads `date,<id>,<id>,...` files. Empty, `NaN`, `NA` and `null` cells are
/// treated as missing closes.
#[derive(Clone, Debug)]
pub struct CsvPriceProvider {
  path: PathBuf,
}

impl CsvPriceProvider {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn read_table(&self) -> Result<PriceTable> {
    let mut reader = csv::ReaderBuilder::new()
      .trim(csv::Trim::All)
      .from_path(&self.path)?;

    let headers = reader.headers()?.clone();
    let instruments: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut dates = Vec::new();
    let mut rows = Vec::new();

    for record in reader.records() {
      let record = record?;
      let raw_date = record.get(0).unwrap_or_default();
      let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
        PortfolioError::Parse {
          what: "date".into(),
          value: raw_date.to_string(),
          reason: e.to_string(),
        }
      })?;

      let row = record
        .iter()
        .skip(1)
        .map(parse_close)
        .collect::<Result<Vec<_>>>()?;

      dates.push(date);
      rows.push(row);
    }

    info!(
      path = %self.path.display(),
      instruments = instruments.len(),
      rows = rows.len(),
      "loaded price csv"
    );

    PriceTable::new(instruments, dates, rows)
  }
}

impl PriceHistoryProvider for CsvPriceProvider {
  fn fetch(&self, instruments: &[String], range: &DateRange) -> Result<PriceTable> {
    let table = self.read_table()?;
    select(&table, instruments, range)
  }
}

fn parse_close(cell: &str) -> Result<Option<f64>> {
  match cell.to_ascii_lowercase().as_str() {
    "" | "nan" | "na" | "n/a" | "null" => Ok(None),
    _ => cell
      .parse::<f64>()
      .map(Some)
      .map_err(|e| PortfolioError::Parse {
        what: "close".into(),
        value: cell.to_string(),
        reason: e.to_string(),
      }),
  }
}

/// Column and date-range projection of a table.
fn select(table: &PriceTable, instruments: &[String], range: &DateRange) -> Result<PriceTable> {
  let columns: Vec<usize> = if instruments.is_empty() {
    (0..table.instruments.len()).collect()
  } else {
    instruments
      .iter()
      .map(|id| {
        table
          .column_index(id)
          .ok_or_else(|| PortfolioError::UnknownInstrument {
            instrument: id.clone(),
          })
      })
      .collect::<Result<_>>()?
  };

  let mut dates = Vec::new();
  let mut rows: Vec<Vec<Option<f64>>> = Vec::new();
  for (date, row) in table.dates.iter().zip(table.rows.iter()) {
    if range.contains(*date) {
      dates.push(*date);
      rows.push(columns.iter().map(|&c| row[c]).collect());
    }
  }

  let names = columns
    .iter()
    .map(|&c| table.instruments[c].clone())
    .collect();
  PriceTable::new(names, dates, rows)
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
  }

  fn table() -> PriceTable {
    PriceTable::new(
      vec!["AAPL".into(), "MSFT".into(), "GOOG".into()],
      vec![day(1), day(2), day(3), day(6)],
      vec![
        vec![Some(170.0), Some(400.0), Some(160.0)],
        vec![Some(172.0), None, Some(161.0)],
        vec![Some(171.0), Some(405.0), Some(163.0)],
        vec![Some(175.0), Some(410.0), Some(162.0)],
      ],
    )
    .unwrap()
  }

  #[test]
  fn in_memory_selects_columns_in_requested_order() {
    let provider = InMemoryPriceProvider::new(table());
    let picked = provider
      .fetch(&["GOOG".into(), "AAPL".into()], &DateRange::default())
      .unwrap();

    assert_eq!(picked.instruments, vec!["GOOG", "AAPL"]);
    assert_eq!(picked.rows[0], vec![Some(160.0), Some(170.0)]);
  }

  #[test]
  fn in_memory_applies_date_range() {
    let provider = InMemoryPriceProvider::new(table());
    let range = DateRange::new(Some(day(2)), Some(day(3)));
    let err = provider.history(&[], &range).unwrap_err();
    // day 2 is missing MSFT, so only one aligned row survives
    assert!(matches!(
      err,
      PortfolioError::InsufficientData { observations: 1, .. }
    ));

    let history = provider
      .history(&["AAPL".into(), "GOOG".into()], &range)
      .unwrap();
    assert_eq!(history.dates(), &[day(2), day(3)]);
  }

  #[test]
  fn unknown_instrument_is_reported_by_name() {
    let provider = InMemoryPriceProvider::new(table());
    let err = provider
      .fetch(&["TSLA".into()], &DateRange::default())
      .unwrap_err();
    assert!(err.to_string().contains("TSLA"));
  }

  #[test]
  fn csv_provider_reads_missing_markers() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,AAA,BBB").unwrap();
    writeln!(file, "2024-05-01,10.0,20.0").unwrap();
    writeln!(file, "2024-05-02,,20.5").unwrap();
    writeln!(file, "2024-05-03,10.4,NaN").unwrap();
    writeln!(file, "2024-05-06,10.6,21.0").unwrap();
    writeln!(file, "2024-05-07, 10.8 ,21.2").unwrap();
    file.flush().unwrap();

    let provider = CsvPriceProvider::new(file.path());
    let table = provider.fetch(&[], &DateRange::default()).unwrap();
    assert_eq!(table.rows[1], vec![None, Some(20.5)]);
    assert_eq!(table.rows[2], vec![Some(10.4), None]);

    let history = provider.history(&[], &DateRange::default()).unwrap();
    assert_eq!(history.n_observations(), 3);
    assert_eq!(history.dates()[2], day(7));
  }

  #[test]
  fn csv_provider_rejects_garbage_close() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,AAA").unwrap();
    writeln!(file, "2024-05-01,ten").unwrap();
    file.flush().unwrap();

    let err = CsvPriceProvider::new(file.path())
      .fetch(&[], &DateRange::default())
      .unwrap_err();
    assert!(matches!(err, PortfolioError::Parse { .. }));
  }
}
