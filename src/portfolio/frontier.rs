//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r)=\min_{\mathbf w\in\Delta^{n-1}}\sqrt{\mathbf w^\top\Sigma\mathbf w}
//! \quad\text{s.t.}\quad \mathbf w^\top\mu=r
//! $$
//!
//! The return equality is imposed by a quadratic penalty tightened over a
//! fixed schedule. Each target starts again from the uniform portfolio, so a
//! point never depends on its neighbours and results are independent of the
//! order or parallelism of evaluation.

use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::market::MarketInputs;
use super::optimizers::nelder_mead;
use super::optimizers::optimize_with_objective;
use super::optimizers::Objective;
use super::optimizers::OptimizerConfig;
use super::optimizers::TargetReturnCost;
use super::types::FrontierAttempt;
use super::types::FrontierOutcome;
use super::types::FrontierPoint;
use super::types::WeightVector;
use crate::stats::portfolio_return;
use crate::stats::portfolio_volatility;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
  /// Treat targets below the minimum-variance return as infeasible.
  pub efficient_only: bool,
  /// Largest accepted `|w·μ - r|`.
  pub equality_tolerance: f64,
  /// Penalty weights applied in order, each stage seeded by the previous one.
  pub penalty_schedule: Vec<f64>,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      efficient_only: true,
      equality_tolerance: 1e-4,
      penalty_schedule: vec![1e2, 1e4, 1e6],
    }
  }
}

/// `n` evenly spaced values from `lo` to `hi`, both included.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
  match n {
    0 => Vec::new(),
    1 => vec![lo],
    _ => {
      let step = (hi - lo) / (n - 1) as f64;
      let mut out: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
      out[n - 1] = hi;
      out
    }
  }
}

/// Targets from the minimum-variance return up to the best single instrument.
pub fn frontier_targets(
  market: &MarketInputs,
  n: usize,
  optimizer: &OptimizerConfig,
) -> Vec<f64> {
  let lower = min_variance_return(market, optimizer);
  linspace(lower, market.max_mean(), n)
}

fn min_variance_return(market: &MarketInputs, optimizer: &OptimizerConfig) -> f64 {
  let mvp = optimize_with_objective(Objective::MinVariance, market, 0.0, optimizer);
  if !mvp.converged {
    warn!(
      termination = %mvp.termination,
      "minimum-variance solve did not converge; using best iterate as frontier floor"
    );
  }
  mvp.stats.expected_return
}

/// Achievable return range for a market.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReturnBounds {
  pub lower: f64,
  pub upper: f64,
  pub efficient_only: bool,
}

impl ReturnBounds {
  /// Bounds from an already solved minimum-variance return.
  pub fn new(market: &MarketInputs, min_variance_return: f64, frontier: &FrontierConfig) -> Self {
    let lower = if frontier.efficient_only {
      min_variance_return
    } else {
      market.min_mean()
    };
    Self {
      lower,
      upper: market.max_mean(),
      efficient_only: frontier.efficient_only,
    }
  }

  /// Bounds for `market`, solving the minimum-variance portfolio only when
  /// the lower bound needs it.
  pub fn solve(
    market: &MarketInputs,
    optimizer: &OptimizerConfig,
    frontier: &FrontierConfig,
  ) -> Self {
    let floor = if frontier.efficient_only {
      min_variance_return(market, optimizer)
    } else {
      market.min_mean()
    };
    Self::new(market, floor, frontier)
  }

  fn reject(&self, target: f64, tol: f64) -> Option<String> {
    if !target.is_finite() {
      Some("target is not finite".into())
    } else if target > self.upper + tol {
      Some(format!("above the highest instrument return {:.6}", self.upper))
    } else if target < self.lower - tol {
      Some(if self.efficient_only {
        format!("below the minimum-variance return {:.6}", self.lower)
      } else {
        format!("below the lowest instrument return {:.6}", self.lower)
      })
    } else {
      None
    }
  }
}

fn solve_target(
  market: &MarketInputs,
  target: f64,
  bounds: &ReturnBounds,
  optimizer: &OptimizerConfig,
  frontier: &FrontierConfig,
) -> FrontierPoint {
  let tol = frontier.equality_tolerance;
  let infeasible = |reason: String, best: Option<FrontierAttempt>| {
    debug!(target, %reason, "infeasible frontier target");
    FrontierPoint {
      target_return: target,
      outcome: FrontierOutcome::Infeasible { reason, best },
    }
  };

  if let Some(reason) = bounds.reject(target, tol) {
    return infeasible(reason, None);
  }

  let mut x = vec![0.0; market.n_instruments()];
  let mut last = None;
  let mut iterations = 0;
  for &penalty in &frontier.penalty_schedule {
    let cost = TargetReturnCost {
      cov: market.cov().to_owned(),
      mean: market.mean().to_owned(),
      target,
      penalty,
    };
    let solve = nelder_mead(cost, x, optimizer);
    iterations += solve.iterations;
    x = solve.x.clone();
    last = Some(solve);
  }

  let Some(solve) = last else {
    return infeasible("empty penalty schedule".into(), None);
  };

  let weights = WeightVector::from_softmax(&solve.x);
  let achieved = portfolio_return(weights.view(), market.mean());
  let residual = (achieved - target).abs();
  let reason = if !solve.converged {
    Some(format!("solver stopped: {}", solve.termination))
  } else if residual > tol {
    Some(format!("return residual {residual:.3e} exceeds tolerance"))
  } else {
    None
  };

  match reason {
    Some(reason) => infeasible(
      reason,
      Some(FrontierAttempt {
        weights,
        objective: solve.cost,
        achieved_return: achieved,
        iterations,
        converged: solve.converged,
        termination: solve.termination,
      }),
    ),
    None => FrontierPoint {
      target_return: target,
      outcome: FrontierOutcome::Feasible {
        volatility: portfolio_volatility(weights.view(), market.cov()),
        weights,
      },
    },
  }
}

fn log_summary(points: &[FrontierPoint]) {
  let feasible = points.iter().filter(|p| p.is_feasible()).count();
  info!(targets = points.len(), feasible, "traced efficient frontier");
}

/// Minimum volatility for every target within precomputed `bounds`, in
/// input order. `parallel` solves the targets on the rayon pool.
pub fn trace_frontier(
  market: &MarketInputs,
  targets: &[f64],
  bounds: &ReturnBounds,
  optimizer: &OptimizerConfig,
  frontier: &FrontierConfig,
  parallel: bool,
) -> Vec<FrontierPoint> {
  let solve = |&target: &f64| solve_target(market, target, bounds, optimizer, frontier);
  let points: Vec<FrontierPoint> = if parallel {
    targets.par_iter().map(solve).collect()
  } else {
    targets.iter().map(solve).collect()
  };
  log_summary(&points);
  points
}

/// Minimum volatility for every target, in input order.
pub fn efficient_frontier(
  market: &MarketInputs,
  targets: &[f64],
  optimizer: &OptimizerConfig,
  frontier: &FrontierConfig,
) -> Vec<FrontierPoint> {
  let bounds = ReturnBounds::solve(market, optimizer, frontier);
  trace_frontier(market, targets, &bounds, optimizer, frontier, false)
}

/// [`efficient_frontier`] with targets solved on the rayon pool.
pub fn efficient_frontier_par(
  market: &MarketInputs,
  targets: &[f64],
  optimizer: &OptimizerConfig,
  frontier: &FrontierConfig,
) -> Vec<FrontierPoint> {
  let bounds = ReturnBounds::solve(market, optimizer, frontier);
  trace_frontier(market, targets, &bounds, optimizer, frontier, true)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::portfolio::optimizers::tests::market;
  use crate::portfolio::optimizers::tests::three_asset_market;

  // uncorrelated: minimum variance at w = (0.8, 0.2), return 0.07
  fn pair() -> MarketInputs {
    market(
      array![0.05, 0.15],
      array![[0.01, 0.0], [0.0, 0.04]],
      array![[0.01, 0.02], [-0.01, -0.03], [0.005, 0.01]],
    )
  }

  #[test]
  fn linspace_includes_both_ends() {
    assert!(linspace(0.0, 1.0, 0).is_empty());
    assert_eq!(linspace(0.3, 1.0, 1), vec![0.3]);
    let xs = linspace(0.1, 0.2, 5);
    assert_eq!(xs.len(), 5);
    assert_eq!(xs[0], 0.1);
    assert_eq!(xs[4], 0.2);
    assert_abs_diff_eq!(xs[2], 0.15, epsilon = 1e-15);
  }

  #[test]
  fn out_of_range_targets_are_infeasible_and_order_is_kept() {
    let targets = [0.02, 0.06, 0.10, 0.14, 0.30, f64::NAN];
    let points = efficient_frontier(
      &pair(),
      &targets,
      &OptimizerConfig::default(),
      &FrontierConfig::default(),
    );

    assert_eq!(points.len(), targets.len());
    for (point, target) in points.iter().zip(targets.iter()) {
      if target.is_nan() {
        assert!(point.target_return.is_nan());
      } else {
        assert_eq!(point.target_return, *target);
      }
    }
    let feasible: Vec<bool> = points.iter().map(FrontierPoint::is_feasible).collect();
    assert_eq!(feasible, vec![false, false, true, true, false, false]);

    // w = (0.5, 0.5): variance 0.25 * 0.01 + 0.25 * 0.04
    assert_abs_diff_eq!(points[2].volatility().unwrap(), 0.0125f64.sqrt(), epsilon = 1e-3);
    // w = (0.1, 0.9)
    assert_abs_diff_eq!(points[3].volatility().unwrap(), 0.0325f64.sqrt(), epsilon = 1e-3);
  }

  #[test]
  fn inefficient_branch_is_available_on_request() {
    let config = FrontierConfig {
      efficient_only: false,
      ..FrontierConfig::default()
    };
    let points = efficient_frontier(&pair(), &[0.06, 0.01], &OptimizerConfig::default(), &config);
    // w = (0.9, 0.1)
    assert_abs_diff_eq!(points[0].volatility().unwrap(), 0.0085f64.sqrt(), epsilon = 1e-3);
    assert!(!points[1].is_feasible());
  }

  #[test]
  fn feasible_points_sit_on_the_simplex_at_their_target() {
    let m = three_asset_market();
    let optimizer = OptimizerConfig::default();
    let targets = frontier_targets(&m, 6, &optimizer);
    let points = efficient_frontier(&m, &targets, &optimizer, &FrontierConfig::default());

    for point in points.iter().filter(|p| p.is_feasible()) {
      let w = point.weights().unwrap();
      assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
      let achieved = portfolio_return(w.view(), m.mean());
      assert!((achieved - point.target_return).abs() <= 1e-4);
      let vol = point.volatility().unwrap();
      assert!(vol.is_finite() && vol >= 0.0);
    }
    assert!(points[1..5].iter().all(FrontierPoint::is_feasible));
  }

  #[test]
  fn stalled_target_keeps_its_best_attempt() {
    let optimizer = OptimizerConfig {
      max_iters: 2,
      ..OptimizerConfig::default()
    };
    let bounds = ReturnBounds::new(&pair(), 0.07, &FrontierConfig::default());
    let points = trace_frontier(
      &pair(),
      &[0.10, 0.30],
      &bounds,
      &optimizer,
      &FrontierConfig::default(),
      false,
    );

    let attempt = points[0].attempt().expect("solve ran");
    assert!(!attempt.converged);
    assert_eq!(attempt.termination, "MaxItersReached");
    assert_eq!(attempt.iterations, 6);
    assert_abs_diff_eq!(attempt.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert!(attempt.objective.is_finite());
    // out of range: nothing was solved
    assert!(!points[1].is_feasible());
    assert!(points[1].attempt().is_none());
  }

  #[test]
  fn weak_penalty_misses_the_target_and_reports_the_residual() {
    let frontier = FrontierConfig {
      penalty_schedule: vec![1e-3],
      ..FrontierConfig::default()
    };
    let points = efficient_frontier(&pair(), &[0.14], &OptimizerConfig::default(), &frontier);

    let FrontierOutcome::Infeasible { reason, best } = &points[0].outcome else {
      panic!("weak penalty should not reach the target");
    };
    assert!(reason.contains("residual"));
    let attempt = best.as_ref().expect("solve ran");
    assert!(attempt.converged);
    // pulled back towards the minimum-variance return 0.07
    assert!(attempt.achieved_return < 0.10);
    assert_abs_diff_eq!(
      attempt.achieved_return,
      portfolio_return(attempt.weights.view(), pair().mean()),
      epsilon = 1e-15
    );
  }

  #[test]
  fn precomputed_bounds_match_solved_bounds() {
    let m = pair();
    let optimizer = OptimizerConfig::default();
    let frontier = FrontierConfig::default();
    let solved = ReturnBounds::solve(&m, &optimizer, &frontier);
    assert_abs_diff_eq!(solved.lower, 0.07, epsilon = 1e-3);
    assert_eq!(solved.upper, 0.15);

    let given = ReturnBounds::new(&m, solved.lower, &frontier);
    assert_eq!(given, solved);
    let wide = ReturnBounds::solve(
      &m,
      &optimizer,
      &FrontierConfig {
        efficient_only: false,
        ..frontier
      },
    );
    assert_eq!(wide.lower, 0.05);
  }

  #[test]
  fn parallel_frontier_matches_serial() {
    let m = pair();
    let targets = linspace(0.0, 0.2, 9);
    let optimizer = OptimizerConfig::default();
    let frontier = FrontierConfig::default();
    assert_eq!(
      efficient_frontier(&m, &targets, &optimizer, &frontier),
      efficient_frontier_par(&m, &targets, &optimizer, &frontier)
    );
  }
}
