//! # Portfolio Metrics
//!
//! $$
//! \mu_p=\mathbf w^\top\mu,\qquad \sigma_p=\sqrt{\max(\mathbf w^\top\Sigma\mathbf w,0)},\qquad S=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Mean-variance statistics of a weight vector.

use ndarray::ArrayView1;
use ndarray::ArrayView2;

/// Expected portfolio return `w·μ`.
pub fn portfolio_return(weights: ArrayView1<'_, f64>, mean: ArrayView1<'_, f64>) -> f64 {
  weights.dot(&mean)
}

/// Raw quadratic form `wᵀΣw`; may be slightly negative from rounding.
pub fn portfolio_variance(weights: ArrayView1<'_, f64>, cov: ArrayView2<'_, f64>) -> f64 {
  weights.dot(&cov.dot(&weights))
}

/// Portfolio volatility. The radicand is clamped at zero so floating-point
/// noise in `cov` never yields NaN.
pub fn portfolio_volatility(weights: ArrayView1<'_, f64>, cov: ArrayView2<'_, f64>) -> f64 {
  let var = portfolio_variance(weights, cov);
  if var.is_nan() {
    return 0.0;
  }
  var.max(0.0).sqrt()
}

/// Sharpe ratio; zero when the volatility is exactly zero.
pub fn sharpe(
  weights: ArrayView1<'_, f64>,
  mean: ArrayView1<'_, f64>,
  cov: ArrayView2<'_, f64>,
  risk_free: f64,
) -> f64 {
  ratio(portfolio_return(weights, mean) - risk_free, portfolio_volatility(weights, cov))
}

pub(crate) fn ratio(excess: f64, risk: f64) -> f64 {
  if risk == 0.0 {
    0.0
  } else {
    excess / risk
  }
}
