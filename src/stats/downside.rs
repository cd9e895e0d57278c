//! # Downside Risk
//!
//! $$
//! \sigma_d=\sqrt{252}\ \operatorname{std}\{p_t : p_t<0\},\qquad p_t=\mathbf r_t^\top\mathbf w,\qquad
//! \text{Sortino}=\frac{\mu_p-r_f}{\sigma_d}
//! $$
//!
//! Downside deviation depends on the full per-period return matrix, not only on
//! the covariance, and changes character whenever the set of losing periods
//! changes.

use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::metrics::portfolio_return;
use super::metrics::ratio;

/// Annualized population standard deviation of the losing periods of the
/// portfolio. Zero when no period loses.
pub fn downside_deviation(
  weights: ArrayView1<'_, f64>,
  returns: ArrayView2<'_, f64>,
  periods_per_year: f64,
) -> f64 {
  let portfolio = returns.dot(&weights);
  let losses: Vec<f64> = portfolio.iter().copied().filter(|p| *p < 0.0).collect();
  if losses.is_empty() {
    return 0.0;
  }

  let n = losses.len() as f64;
  let mean = losses.iter().sum::<f64>() / n;
  let var = losses.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
  var.max(0.0).sqrt() * periods_per_year.sqrt()
}

/// Sortino ratio; zero when the downside deviation is zero.
pub fn sortino(
  weights: ArrayView1<'_, f64>,
  mean: ArrayView1<'_, f64>,
  returns: ArrayView2<'_, f64>,
  risk_free: f64,
  periods_per_year: f64,
) -> f64 {
  ratio(
    portfolio_return(weights, mean) - risk_free,
    downside_deviation(weights, returns, periods_per_year),
  )
}
