//! # Portfolio Reports
//!
//! $$
//! \text{report} = \big(\text{label},\ \{(\text{id}_i, \operatorname{round}(w_i, d))\},\ \mu_p,\ \sigma_p,\ \sigma_d,\ S,\ \text{Sortino}\big)
//! $$
//!
//! Immutable result records holding raw numbers. Formatting belongs to the
//! presentation layer.

use std::cmp::Ordering;
use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::Serialize;

use super::market::MarketInputs;
use super::types::PortfolioStats;
use super::types::RiskModel;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Allocation {
  pub instrument: String,
  pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioReport {
  pub label: String,
  /// Sorted by descending weight, then by instrument.
  pub allocations: Vec<Allocation>,
  pub expected_return: f64,
  pub volatility: f64,
  pub downside_deviation: f64,
  pub sharpe: f64,
  pub sortino: f64,
  pub converged: bool,
}

impl PortfolioReport {
  pub fn ratio(&self, model: RiskModel) -> f64 {
    match model {
      RiskModel::Sharpe => self.sharpe,
      RiskModel::Sortino => self.sortino,
    }
  }

  /// Weight of `instrument`, if present.
  pub fn weight_of(&self, instrument: &str) -> Option<f64> {
    self
      .allocations
      .iter()
      .find(|a| a.instrument == instrument)
      .map(|a| a.weight)
  }

  /// Total order on the chosen ratio; NaN sorts above every number.
  pub fn cmp_by(&self, other: &Self, model: RiskModel) -> Ordering {
    OrderedFloat(self.ratio(model)).cmp(&OrderedFloat(other.ratio(model)))
  }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
  let scale = 10f64.powi(decimals as i32);
  (value * scale).round() / scale
}

/// Pair instrument labels with rounded weights and copy the raw metrics.
pub fn assemble_report(
  label: &str,
  market: &MarketInputs,
  stats: &PortfolioStats,
  decimals: u32,
  converged: bool,
) -> PortfolioReport {
  let mut allocations: Vec<Allocation> = market
    .instruments()
    .iter()
    .zip(stats.weights.iter())
    .map(|(instrument, weight)| Allocation {
      instrument: instrument.clone(),
      weight: round_to(weight, decimals),
    })
    .collect();
  allocations.sort_by(|a, b| {
    OrderedFloat(b.weight)
      .cmp(&OrderedFloat(a.weight))
      .then_with(|| a.instrument.cmp(&b.instrument))
  });

  PortfolioReport {
    label: label.to_string(),
    allocations,
    expected_return: stats.expected_return,
    volatility: stats.volatility,
    downside_deviation: stats.downside_deviation,
    sharpe: stats.sharpe,
    sortino: stats.sortino,
    converged,
  }
}

/// Sort best first by `model`. Stable, so equal ratios keep their order.
pub fn rank_reports(reports: &mut [PortfolioReport], model: RiskModel) {
  reports.sort_by_key(|r| Reverse(OrderedFloat(r.ratio(model))));
}
