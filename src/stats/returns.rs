//! # Return Series
//!
//! $$
//! r_{t,i}=\ln\frac{P_{t,i}}{P_{t-1,i}}
//! $$
//!
//! Log returns and their annualized first and second moments.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::warn;

use crate::data::history::span_of;
use crate::data::PriceHistory;
use crate::error::PortfolioError;
use crate::error::Result;

/// Minimum number of return periods for a sample covariance.
pub const MIN_PERIODS: usize = 2;

/// Per-period log returns (rows = periods, columns = instruments).
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  instruments: Vec<String>,
  dates: Vec<NaiveDate>,
  returns: Array2<f64>,
}

impl ReturnSeries {
  /// Wrap an existing return matrix. `dates` may be empty when the series is
  /// synthetic; otherwise it must have one entry per row.
  pub fn new(
    instruments: Vec<String>,
    dates: Vec<NaiveDate>,
    returns: Array2<f64>,
  ) -> Result<Self> {
    let (t, n) = returns.dim();
    if n != instruments.len() {
      return Err(PortfolioError::DimensionMismatch {
        field: "return columns".into(),
        expected: instruments.len(),
        actual: n,
      });
    }
    if !dates.is_empty() && dates.len() != t {
      return Err(PortfolioError::DimensionMismatch {
        field: "return dates".into(),
        expected: t,
        actual: dates.len(),
      });
    }
    if n == 0 || t < MIN_PERIODS {
      return Err(PortfolioError::InsufficientData {
        instruments,
        observations: t,
        required: MIN_PERIODS,
        span: span_of(&dates),
      });
    }

    Ok(Self {
      instruments,
      dates,
      returns,
    })
  }

  pub fn instruments(&self) -> &[String] {
    &self.instruments
  }

  /// Period end dates.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn matrix(&self) -> ArrayView2<'_, f64> {
    self.returns.view()
  }

  pub fn n_periods(&self) -> usize {
    self.returns.nrows()
  }

  pub fn n_instruments(&self) -> usize {
    self.returns.ncols()
  }
}

/// Log-difference the history and drop periods holding any non-finite value.
pub fn log_returns(history: &PriceHistory) -> Result<ReturnSeries> {
  let prices = history.prices();
  let n = history.n_instruments();
  let mut dates = Vec::with_capacity(history.n_observations().saturating_sub(1));
  let mut flat = Vec::with_capacity(dates.capacity() * n);
  let mut dropped = 0usize;

  for t in 1..prices.nrows() {
    let row: Vec<f64> = (0..n)
      .map(|i| (prices[[t, i]] / prices[[t - 1, i]]).ln())
      .collect();
    if row.iter().all(|r| r.is_finite()) {
      flat.extend(row);
      dates.push(history.dates()[t]);
    } else {
      dropped += 1;
    }
  }

  if dropped > 0 {
    warn!(dropped, "dropped non-finite return periods");
  }

  let t = dates.len();
  let returns = Array2::from_shape_vec((t, n), flat).map_err(|_| PortfolioError::DimensionMismatch {
    field: "return matrix".into(),
    expected: t * n,
    actual: 0,
  })?;

  ReturnSeries::new(history.instruments().to_vec(), dates, returns).map_err(|err| match err {
    PortfolioError::InsufficientData {
      instruments,
      observations,
      required,
      ..
    } => PortfolioError::InsufficientData {
      instruments,
      observations,
      required,
      span: history.span(),
    },
    other => other,
  })
}

/// Sample mean per instrument, scaled by `periods_per_year`.
pub fn annualized_mean(returns: &ReturnSeries, periods_per_year: f64) -> Array1<f64> {
  returns
    .returns
    .mean_axis(Axis(0))
    .unwrap_or_else(|| Array1::zeros(returns.n_instruments()))
    * periods_per_year
}

/// Sample covariance (ddof = 1), scaled by `periods_per_year` and symmetrized.
pub fn annualized_covariance(returns: &ReturnSeries, periods_per_year: f64) -> Array2<f64> {
  let n = returns.n_instruments();
  let cov = match returns.returns.t().cov(1.0) {
    Ok(cov) => cov,
    Err(_) => return Array2::zeros((n, n)),
  };
  (&cov + &cov.t()) * (0.5 * periods_per_year)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::Duration;
  use ndarray::array;

  use super::*;

  fn history(columns: &[(&str, &[f64])]) -> PriceHistory {
    let t = columns[0].1.len();
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let dates = (0..t).map(|i| start + Duration::days(i as i64)).collect();
    let mut prices = Array2::zeros((t, columns.len()));
    for (j, (_, closes)) in columns.iter().enumerate() {
      for (i, c) in closes.iter().enumerate() {
        prices[[i, j]] = *c;
      }
    }
    PriceHistory::new(
      columns.iter().map(|(s, _)| s.to_string()).collect(),
      dates,
      prices,
    )
    .unwrap()
  }

  #[test]
  fn log_returns_have_one_fewer_row() {
    let h = history(&[("A", &[100.0, 110.0, 121.0]), ("B", &[100.0, 105.0, 110.25])]);
    let r = log_returns(&h).unwrap();
    assert_eq!(r.n_periods(), 2);
    assert_abs_diff_eq!(r.matrix()[[0, 0]], 1.1f64.ln(), epsilon = 1e-12);
    assert_abs_diff_eq!(r.matrix()[[1, 1]], 1.05f64.ln(), epsilon = 1e-12);
    assert_eq!(r.dates()[0], h.dates()[1]);
  }

  #[test]
  fn two_prices_are_insufficient_for_returns() {
    let h = history(&[("A", &[100.0, 101.0])]);
    match log_returns(&h) {
      Err(PortfolioError::InsufficientData {
        observations, span, ..
      }) => {
        assert_eq!(observations, 1);
        assert_eq!(span, h.span());
      }
      other => panic!("expected insufficient data, got {other:?}"),
    }
  }

  #[test]
  fn moments_are_annualized() {
    let r = ReturnSeries::new(
      vec!["A".into(), "B".into()],
      vec![],
      array![[0.01, 0.02], [0.03, -0.02], [-0.01, 0.00]],
    )
    .unwrap();

    let mean = annualized_mean(&r, 252.0);
    assert_abs_diff_eq!(mean[0], 0.01 * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(mean[1], 0.0, epsilon = 1e-12);

    let cov = annualized_covariance(&r, 252.0);
    // var(A) = ((0)^2 + (0.02)^2 + (-0.02)^2) / 2
    assert_abs_diff_eq!(cov[[0, 0]], 0.0004 * 252.0, epsilon = 1e-12);
    // cov(A,B) = (0*0.02 + 0.02*-0.02 + -0.02*0) / 2
    assert_abs_diff_eq!(cov[[0, 1]], -0.0002 * 252.0, epsilon = 1e-12);
    assert_eq!(cov[[0, 1]], cov[[1, 0]]);
  }

  #[test]
  fn constant_growth_has_zero_covariance() {
    let h = history(&[("A", &[100.0, 110.0, 121.0]), ("B", &[100.0, 105.0, 110.25])]);
    let r = log_returns(&h).unwrap();
    let cov = annualized_covariance(&r, 252.0);
    for v in cov.iter() {
      assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
    }
  }
}
