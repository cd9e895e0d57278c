//! # Errors
//!
//! $$
//! \text{structural failure} \;\lor\; \text{solver failure} \mapsto \texttt{PortfolioError}
//! $$
//!
//! Only structurally invalid inputs and failed solves raise. Numerically
//! degenerate but valid inputs (zero volatility, no downside periods) are
//! resolved by the zero-ratio policy and never reach this type.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::portfolio::types::OptimizedPortfolio;

pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Inclusive date span used to locate a failure in the input history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl std::fmt::Display for DateSpan {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}..={}", self.start, self.end)
  }
}

fn span_suffix(span: &Option<DateSpan>) -> String {
  match span {
    Some(span) => format!(" over {span}"),
    None => String::new(),
  }
}

#[derive(Debug, Error)]
pub enum PortfolioError {
  #[error(
    "insufficient data for [{}]: {observations} usable observations, at least {required} required{}",
    .instruments.join(", "),
    span_suffix(.span)
  )]
  InsufficientData {
    instruments: Vec<String>,
    observations: usize,
    required: usize,
    span: Option<DateSpan>,
  },

  #[error("dimension mismatch in {field}: expected {expected}, got {actual}")]
  DimensionMismatch {
    field: String,
    expected: usize,
    actual: usize,
  },

  #[error("invalid input: {field} ({reason})")]
  InvalidInput { field: String, reason: String },

  #[error("invalid price {value} for {instrument} on {date}")]
  InvalidPrice {
    instrument: String,
    date: NaiveDate,
    value: f64,
  },

  #[error("unknown instrument {instrument}")]
  UnknownInstrument { instrument: String },

  #[error("weights are not on the long-only simplex: {reason}")]
  InvalidWeights { reason: String },

  #[error(
    "{objective} did not converge ({reason}) after {} iterations, best objective {}",
    .best.iterations,
    .best.objective
  )]
  OptimizationFailure {
    objective: String,
    reason: String,
    best: Box<OptimizedPortfolio>,
  },

  #[error("failed to parse {what} `{value}`: {reason}")]
  Parse {
    what: String,
    value: String,
    reason: String,
  },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Csv(#[from] csv::Error),
}

impl PortfolioError {
  /// Best iterate of a failed solve, if this is an optimizer failure.
  pub fn best_iterate(&self) -> Option<&OptimizedPortfolio> {
    match self {
      PortfolioError::OptimizationFailure { best, .. } => Some(best),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insufficient_data_names_instruments_and_span() {
    let err = PortfolioError::InsufficientData {
      instruments: vec!["AAPL".into(), "MSFT".into()],
      observations: 1,
      required: 2,
      span: Some(DateSpan {
        start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
      }),
    };
    let msg = err.to_string();
    assert!(msg.contains("AAPL, MSFT"));
    assert!(msg.contains("2024-01-02..=2024-01-03"));
  }

  #[test]
  fn best_iterate_only_for_optimizer_failures() {
    let err = PortfolioError::UnknownInstrument {
      instrument: "XYZ".into(),
    };
    assert!(err.best_iterate().is_none());
  }
}
