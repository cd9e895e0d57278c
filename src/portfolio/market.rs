//! # Market Inputs
//!
//! $$
//! \mu = p\,\bar r,\qquad \Sigma = p\,\widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Annualized moments plus the raw return matrix, built once from a price
//! history and shared read-only by the sampler, optimizers and reports.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use tracing::info;

use super::types::PortfolioStats;
use super::types::WeightVector;
use crate::data::PriceHistory;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::annualized_covariance;
use crate::stats::annualized_mean;
use crate::stats::log_returns;
use crate::stats::ReturnSeries;

const SYMMETRY_TOLERANCE: f64 = 1e-10;

#[derive(Clone, Debug, PartialEq)]
pub struct MarketInputs {
  instruments: Vec<String>,
  mean: Array1<f64>,
  cov: Array2<f64>,
  returns: Array2<f64>,
  periods_per_year: f64,
}

impl MarketInputs {
  /// Assemble inputs from explicit moments. `returns` holds per-period
  /// returns (rows = periods) and feeds the downside metrics.
  pub fn new(
    instruments: Vec<String>,
    mean: Array1<f64>,
    cov: Array2<f64>,
    returns: Array2<f64>,
    periods_per_year: f64,
  ) -> Result<Self> {
    let n = instruments.len();
    if n == 0 {
      return Err(PortfolioError::InsufficientData {
        instruments,
        observations: returns.nrows(),
        required: 1,
        span: None,
      });
    }
    check_len("mean", n, mean.len())?;
    check_len("covariance rows", n, cov.nrows())?;
    check_len("covariance columns", n, cov.ncols())?;
    check_len("return columns", n, returns.ncols())?;

    if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
      return Err(PortfolioError::InvalidInput {
        field: "periods_per_year".into(),
        reason: format!("must be positive, got {periods_per_year}"),
      });
    }
    if mean.iter().chain(cov.iter()).chain(returns.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::InvalidInput {
        field: "market inputs".into(),
        reason: "non-finite entry".into(),
      });
    }
    for i in 0..n {
      for j in (i + 1)..n {
        let (a, b) = (cov[[i, j]], cov[[j, i]]);
        if (a - b).abs() > SYMMETRY_TOLERANCE * a.abs().max(b.abs()).max(1.0) {
          return Err(PortfolioError::InvalidInput {
            field: "covariance".into(),
            reason: format!("not symmetric at ({i}, {j})"),
          });
        }
      }
    }

    Ok(Self {
      instruments,
      mean,
      cov,
      returns,
      periods_per_year,
    })
  }

  /// Annualized moments of a return series.
  pub fn from_returns(returns: &ReturnSeries, periods_per_year: f64) -> Result<Self> {
    Self::new(
      returns.instruments().to_vec(),
      annualized_mean(returns, periods_per_year),
      annualized_covariance(returns, periods_per_year),
      returns.matrix().to_owned(),
      periods_per_year,
    )
  }

  /// Log returns and annualized moments of a validated price history.
  pub fn from_history(history: &PriceHistory, periods_per_year: f64) -> Result<Self> {
    let returns = log_returns(history)?;
    let market = Self::from_returns(&returns, periods_per_year)?;
    info!(
      instruments = market.n_instruments(),
      periods = returns.n_periods(),
      span = ?history.span(),
      "built market inputs"
    );
    Ok(market)
  }

  pub fn instruments(&self) -> &[String] {
    &self.instruments
  }

  pub fn n_instruments(&self) -> usize {
    self.instruments.len()
  }

  /// Annualized mean return vector.
  pub fn mean(&self) -> ArrayView1<'_, f64> {
    self.mean.view()
  }

  /// Annualized covariance matrix.
  pub fn cov(&self) -> ArrayView2<'_, f64> {
    self.cov.view()
  }

  /// Per-period return matrix.
  pub fn returns(&self) -> ArrayView2<'_, f64> {
    self.returns.view()
  }

  pub fn periods_per_year(&self) -> f64 {
    self.periods_per_year
  }

  /// Highest single-instrument expected return, the top of the achievable range.
  pub fn max_mean(&self) -> f64 {
    self.mean.iter().copied().fold(f64::NEG_INFINITY, f64::max)
  }

  pub fn min_mean(&self) -> f64 {
    self.mean.iter().copied().fold(f64::INFINITY, f64::min)
  }

  /// Check a caller-supplied weight vector against the instrument count.
  pub fn weights(&self, weights: Vec<f64>) -> Result<WeightVector> {
    check_len("weights", self.n_instruments(), weights.len())?;
    WeightVector::new(weights)
  }

  pub fn stats(&self, weights: WeightVector, risk_free: f64) -> PortfolioStats {
    PortfolioStats::compute(weights, self, risk_free)
  }
}

fn check_len(field: &str, expected: usize, actual: usize) -> Result<()> {
  if expected != actual {
    return Err(PortfolioError::DimensionMismatch {
      field: field.into(),
      expected,
      actual,
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::array;

  use super::*;

  #[test]
  fn dimension_mismatches_are_reported_per_field() {
    let err = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2, 0.3],
      Array2::zeros((2, 2)),
      Array2::zeros((3, 2)),
      252.0,
    )
    .unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::DimensionMismatch { expected: 2, actual: 3, .. }
    ));

    let err = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      Array2::zeros((2, 3)),
      Array2::zeros((3, 2)),
      252.0,
    )
    .unwrap_err();
    assert!(err.to_string().contains("covariance columns"));
  }

  #[test]
  fn asymmetric_covariance_is_rejected() {
    let err = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      array![[0.04, 0.01], [0.02, 0.09]],
      Array2::zeros((3, 2)),
      252.0,
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidInput { .. }));
  }

  #[test]
  fn weights_must_match_instrument_count() {
    let market = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      array![[0.04, 0.0], [0.0, 0.09]],
      Array2::zeros((3, 2)),
      252.0,
    )
    .unwrap();
    assert!(matches!(
      market.weights(vec![1.0]),
      Err(PortfolioError::DimensionMismatch { .. })
    ));
    assert!(market.weights(vec![0.3, 0.7]).is_ok());
  }

  #[test]
  fn from_history_annualizes_log_returns() {
    let dates = (1..=4)
      .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
      .collect();
    let history = PriceHistory::new(
      vec!["A".into(), "B".into()],
      dates,
      array![[100.0, 50.0], [101.0, 49.0], [103.0, 50.0], [102.0, 51.0]],
    )
    .unwrap();
    let market = MarketInputs::from_history(&history, 252.0).unwrap();

    let expected = (102.0f64 / 100.0).ln() / 3.0 * 252.0;
    assert_abs_diff_eq!(market.mean()[0], expected, epsilon = 1e-12);
    assert_eq!(market.returns().nrows(), 3);
    assert_eq!(market.max_mean(), market.mean()[0].max(market.mean()[1]));
  }
}
