//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Weight vectors, derived statistics and optimizer result containers.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::market::MarketInputs;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::downside_deviation;
use crate::stats::metrics::ratio;
use crate::stats::portfolio_return;
use crate::stats::portfolio_volatility;

/// Allowed deviation of `Σw` from one and of each weight from `[0, 1]`.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Long-only, fully invested weights. Validated on construction and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
  /// Validate `weights` against the simplex.
  pub fn new(weights: Vec<f64>) -> Result<Self> {
    if weights.is_empty() {
      return Err(PortfolioError::InvalidWeights {
        reason: "no weights".into(),
      });
    }
    if let Some((i, w)) = weights
      .iter()
      .enumerate()
      .find(|(_, w)| !w.is_finite() || **w < -WEIGHT_TOLERANCE || **w > 1.0 + WEIGHT_TOLERANCE)
    {
      return Err(PortfolioError::InvalidWeights {
        reason: format!("weight {i} = {w} outside [0, 1]"),
      });
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(PortfolioError::InvalidWeights {
        reason: format!("weights sum to {sum}"),
      });
    }
    Ok(Self(weights))
  }

  /// `1/n` in every slot.
  pub fn uniform(n: usize) -> Self {
    Self(vec![1.0 / n as f64; n])
  }

  /// Normalize non-negative raw draws by their sum. Falls back to the uniform
  /// vector when the sum vanishes.
  pub(crate) fn from_unnormalized(raw: &[f64]) -> Self {
    let sum: f64 = raw.iter().sum();
    if !(sum.is_finite() && sum > 1e-15) {
      return Self::uniform(raw.len());
    }
    Self(raw.iter().map(|&v| v / sum).collect())
  }

  /// Map unconstrained coordinates onto the simplex.
  pub(crate) fn from_softmax(x: &[f64]) -> Self {
    Self(softmax(x))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  pub fn view(&self) -> ArrayView1<'_, f64> {
    ArrayView1::from(&self.0[..])
  }

  pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
    self.0.iter().copied()
  }
}

impl TryFrom<Vec<f64>> for WeightVector {
  type Error = PortfolioError;

  fn try_from(weights: Vec<f64>) -> Result<Self> {
    Self::new(weights)
  }
}

impl From<WeightVector> for Vec<f64> {
  fn from(weights: WeightVector) -> Self {
    weights.0
  }
}

pub(crate) fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if !sum.is_finite() || sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

/// Risk-adjusted return measure used to rank portfolios.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskModel {
  /// Excess return over volatility.
  #[default]
  Sharpe,
  /// Excess return over downside deviation.
  Sortino,
}

impl fmt::Display for RiskModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Sharpe => f.write_str("sharpe"),
      Self::Sortino => f.write_str("sortino"),
    }
  }
}

impl FromStr for RiskModel {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "sharpe" => Ok(Self::Sharpe),
      "sortino" => Ok(Self::Sortino),
      _ => Err(PortfolioError::Parse {
        what: "risk model".into(),
        value: s.to_string(),
        reason: "expected `sharpe` or `sortino`".into(),
      }),
    }
  }
}

/// A ratio whose denominator was exactly zero and was therefore reported as 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DegenerateMetric {
  ZeroVolatility,
  ZeroDownsideDeviation,
}

/// Statistics of one weight vector against one set of market inputs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioStats {
  pub weights: WeightVector,
  /// Annualized `w·μ`.
  pub expected_return: f64,
  /// Annualized `sqrt(max(wᵀΣw, 0))`.
  pub volatility: f64,
  /// Annualized downside deviation of the per-period portfolio returns.
  pub downside_deviation: f64,
  pub sharpe: f64,
  pub sortino: f64,
}

impl PortfolioStats {
  /// Evaluate `weights` against `market`. Always recomputed; nothing is cached
  /// between market snapshots.
  pub fn compute(weights: WeightVector, market: &MarketInputs, risk_free: f64) -> Self {
    let w = weights.view();
    let expected_return = portfolio_return(w, market.mean());
    let volatility = portfolio_volatility(w, market.cov());
    let downside = downside_deviation(w, market.returns(), market.periods_per_year());
    let stats = Self {
      expected_return,
      volatility,
      downside_deviation: downside,
      sharpe: ratio(expected_return - risk_free, volatility),
      sortino: ratio(expected_return - risk_free, downside),
      weights,
    };

    let flags = stats.degeneracies();
    if !flags.is_empty() {
      debug!(?flags, expected_return, "degenerate portfolio metrics reported as zero");
    }
    stats
  }

  /// Ratio selected by `model`.
  pub fn ratio(&self, model: RiskModel) -> f64 {
    match model {
      RiskModel::Sharpe => self.sharpe,
      RiskModel::Sortino => self.sortino,
    }
  }

  pub fn degeneracies(&self) -> Vec<DegenerateMetric> {
    let mut flags = Vec::new();
    if self.volatility == 0.0 {
      flags.push(DegenerateMetric::ZeroVolatility);
    }
    if self.downside_deviation == 0.0 {
      flags.push(DegenerateMetric::ZeroDownsideDeviation);
    }
    flags
  }
}

/// Outcome of one constrained solve.
///
/// `objective` is the objective in its natural sense: variance for the
/// minimum-variance solve, the ratio itself for the maximizers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizedPortfolio {
  pub stats: PortfolioStats,
  pub objective: f64,
  pub converged: bool,
  pub iterations: u64,
  /// Solver termination reason.
  pub termination: String,
}

/// One target on the efficient frontier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub outcome: FrontierOutcome,
}

/// Best iterate of a frontier solve that was rejected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontierAttempt {
  pub weights: WeightVector,
  /// Penalized cost of the last stage.
  pub objective: f64,
  pub achieved_return: f64,
  /// Summed over the penalty stages.
  pub iterations: u64,
  pub converged: bool,
  pub termination: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FrontierOutcome {
  Feasible {
    volatility: f64,
    weights: WeightVector,
  },
  Infeasible {
    reason: String,
    /// `None` when the target was rejected before any solve ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    best: Option<FrontierAttempt>,
  },
}

impl FrontierPoint {
  pub fn is_feasible(&self) -> bool {
    matches!(self.outcome, FrontierOutcome::Feasible { .. })
  }

  /// Minimum volatility reached at this target, if feasible.
  pub fn volatility(&self) -> Option<f64> {
    match &self.outcome {
      FrontierOutcome::Feasible { volatility, .. } => Some(*volatility),
      FrontierOutcome::Infeasible { .. } => None,
    }
  }

  pub fn weights(&self) -> Option<&WeightVector> {
    match &self.outcome {
      FrontierOutcome::Feasible { weights, .. } => Some(weights),
      FrontierOutcome::Infeasible { .. } => None,
    }
  }

  /// Rejected solve behind an infeasible point.
  pub fn attempt(&self) -> Option<&FrontierAttempt> {
    match &self.outcome {
      FrontierOutcome::Infeasible { best, .. } => best.as_ref(),
      FrontierOutcome::Feasible { .. } => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn weight_vector_rejects_points_off_the_simplex() {
    assert!(WeightVector::new(vec![0.5, 0.5]).is_ok());
    assert!(WeightVector::new(vec![]).is_err());
    assert!(WeightVector::new(vec![0.6, 0.6]).is_err());
    assert!(WeightVector::new(vec![1.2, -0.2]).is_err());
    assert!(WeightVector::new(vec![f64::NAN, 1.0]).is_err());
  }

  #[test]
  fn softmax_stays_on_simplex_for_extreme_inputs() {
    for x in [
      vec![0.0, 0.0, 0.0],
      vec![800.0, -800.0, 0.0],
      vec![1e300, 1e300],
      vec![-3.0, 2.5, 0.1, 7.0],
    ] {
      let w = WeightVector::from_softmax(&x);
      assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = WEIGHT_TOLERANCE);
      assert!(w.iter().all(|v| (0.0..=1.0).contains(&v)));
    }
  }

  #[test]
  fn deserialization_validates_weights() {
    let ok: WeightVector = serde_json::from_str("[0.25, 0.75]").unwrap();
    assert_eq!(ok.as_slice(), &[0.25, 0.75]);
    assert!(serde_json::from_str::<WeightVector>("[0.5, 0.75]").is_err());
  }

  #[test]
  fn risk_model_parses_case_insensitively() {
    assert_eq!("Sortino".parse::<RiskModel>().unwrap(), RiskModel::Sortino);
    assert_eq!("sharpe".parse::<RiskModel>().unwrap(), RiskModel::Sharpe);
    assert!("calmar".parse::<RiskModel>().is_err());
  }

  #[test]
  fn degenerate_ratios_are_zero_and_flagged() {
    let market = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.1, 0.2],
      array![[0.0, 0.0], [0.0, 0.0]],
      array![[0.01, 0.02], [0.01, 0.02]],
      252.0,
    )
    .unwrap();
    let stats = PortfolioStats::compute(WeightVector::uniform(2), &market, 0.05);

    assert_eq!(stats.volatility, 0.0);
    assert_eq!(stats.sharpe, 0.0);
    assert_eq!(stats.sortino, 0.0);
    assert_eq!(
      stats.degeneracies(),
      vec![
        DegenerateMetric::ZeroVolatility,
        DegenerateMetric::ZeroDownsideDeviation
      ]
    );
  }

  #[test]
  fn stats_match_direct_formulas() {
    let market = MarketInputs::new(
      vec!["A".into(), "B".into()],
      array![0.12, 0.04],
      array![[0.04, 0.0], [0.0, 0.01]],
      array![[0.02, -0.01], [-0.01, 0.0], [0.01, 0.01]],
      252.0,
    )
    .unwrap();
    let stats = PortfolioStats::compute(WeightVector::new(vec![0.5, 0.5]).unwrap(), &market, 0.02);

    assert_abs_diff_eq!(stats.expected_return, 0.08, epsilon = 1e-12);
    assert_abs_diff_eq!(stats.volatility, 0.0125f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(stats.sharpe, 0.06 / 0.0125f64.sqrt(), epsilon = 1e-9);
    assert_eq!(stats.ratio(RiskModel::Sharpe), stats.sharpe);
    assert_eq!(stats.ratio(RiskModel::Sortino), stats.sortino);
  }
}
