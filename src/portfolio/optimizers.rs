//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf x\in\mathbb R^n} f(\operatorname{softmax}(\mathbf x)),\qquad
//! f\in\{\ \mathbf w^\top\Sigma\mathbf w,\ -S(\mathbf w),\ -\text{Sortino}(\mathbf w)\ \}
//! $$
//!
//! Long-only optimizers on the simplex. Weights are parameterized as
//! `w = softmax(x)` so every iterate satisfies `Σw = 1` and `0 ≤ w ≤ 1`
//! exactly, and Nelder–Mead searches the unconstrained `x` starting from
//! `x = 0`, the uniform portfolio.

use std::fmt;
use std::time::Duration;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::market::MarketInputs;
use super::types::softmax;
use super::types::OptimizedPortfolio;
use super::types::PortfolioStats;
use super::types::RiskModel;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::downside::sortino;
use crate::stats::portfolio_variance;
use crate::stats::sharpe;

/// Solver settings shared by every Nelder–Mead run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
  /// Iteration cap per solve.
  pub max_iters: u64,
  /// Convergence threshold on the standard deviation of the simplex costs.
  pub sd_tolerance: f64,
  /// Edge length of the initial simplex in softmax coordinates.
  pub initial_step: f64,
  /// Optional wall-clock budget per solve, in milliseconds.
  pub timeout_ms: Option<u64>,
  /// Extra random seeds for the Sortino objective.
  pub restarts: usize,
  /// Seed for the restart points.
  pub restart_seed: u64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iters: 10_000,
      sd_tolerance: 1e-8,
      initial_step: 1.0,
      timeout_ms: None,
      restarts: 0,
      restart_seed: 0,
    }
  }
}

/// Objectives solved by [`optimize_with_objective`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
  /// Minimize `wᵀΣw`.
  MinVariance,
  /// Maximize the Sharpe ratio.
  MaxSharpe,
  /// Maximize the Sortino ratio over the full return matrix.
  MaxSortino,
}

impl Objective {
  /// Maximizer matching a ranking ratio.
  pub fn maximizing(model: RiskModel) -> Self {
    match model {
      RiskModel::Sharpe => Self::MaxSharpe,
      RiskModel::Sortino => Self::MaxSortino,
    }
  }

  /// Factor turning the minimized cost back into the objective's natural sign.
  fn sign(self) -> f64 {
    match self {
      Self::MinVariance => 1.0,
      Self::MaxSharpe | Self::MaxSortino => -1.0,
    }
  }
}

impl fmt::Display for Objective {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MinVariance => f.write_str("minimum variance"),
      Self::MaxSharpe => f.write_str("maximum sharpe"),
      Self::MaxSortino => f.write_str("maximum sortino"),
    }
  }
}

/// A scalar function of simplex weights.
pub(crate) trait SimplexObjective {
  fn evaluate(&self, w: ArrayView1<'_, f64>) -> f64;
}

struct VarianceCost {
  cov: Array2<f64>,
}

impl SimplexObjective for VarianceCost {
  fn evaluate(&self, w: ArrayView1<'_, f64>) -> f64 {
    portfolio_variance(w, self.cov.view())
  }
}

/// Variance plus a quadratic penalty on the distance to a target return.
pub(crate) struct TargetReturnCost {
  pub cov: Array2<f64>,
  pub mean: Array1<f64>,
  pub target: f64,
  pub penalty: f64,
}

impl SimplexObjective for TargetReturnCost {
  fn evaluate(&self, w: ArrayView1<'_, f64>) -> f64 {
    let residual = w.dot(&self.mean) - self.target;
    portfolio_variance(w, self.cov.view()) + self.penalty * residual * residual
  }
}

struct NegSharpeCost {
  mean: Array1<f64>,
  cov: Array2<f64>,
  risk_free: f64,
}

impl SimplexObjective for NegSharpeCost {
  fn evaluate(&self, w: ArrayView1<'_, f64>) -> f64 {
    -sharpe(w, self.mean.view(), self.cov.view(), self.risk_free)
  }
}

struct NegSortinoCost {
  mean: Array1<f64>,
  returns: Array2<f64>,
  risk_free: f64,
  periods_per_year: f64,
}

impl SimplexObjective for NegSortinoCost {
  fn evaluate(&self, w: ArrayView1<'_, f64>) -> f64 {
    -sortino(
      w,
      self.mean.view(),
      self.returns.view(),
      self.risk_free,
      self.periods_per_year,
    )
  }
}

/// Lifts a simplex objective to unconstrained coordinates.
struct SoftmaxProblem<O> {
  objective: O,
}

impl<O: SimplexObjective> SoftmaxProblem<O> {
  fn eval(&self, x: &[f64]) -> f64 {
    let w = softmax(x);
    let value = self.objective.evaluate(ArrayView1::from(&w[..]));
    if value.is_nan() {
      f64::INFINITY
    } else {
      value
    }
  }
}

impl<O: SimplexObjective> CostFunction for SoftmaxProblem<O> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    Ok(self.eval(x))
  }
}

/// Raw result of one Nelder–Mead run in softmax coordinates.
#[derive(Clone, Debug)]
pub(crate) struct Solve {
  pub x: Vec<f64>,
  pub cost: f64,
  pub converged: bool,
  pub iterations: u64,
  pub termination: String,
}

impl Solve {
  fn weights(&self) -> WeightVector {
    WeightVector::from_softmax(&self.x)
  }

  /// Converged runs first, then lower cost.
  fn better_than(&self, other: &Solve) -> bool {
    match (self.converged, other.converged) {
      (true, false) => true,
      (false, true) => false,
      _ => self.cost < other.cost,
    }
  }
}

/// `x0` plus one vertex per coordinate axis.
fn initial_simplex(x0: &[f64], step: f64) -> Vec<Vec<f64>> {
  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.to_vec());
  for i in 0..x0.len() {
    let mut point = x0.to_vec();
    point[i] += step;
    simplex.push(point);
  }
  simplex
}

/// Run Nelder–Mead from `x0`. Solver errors become non-converged solves that
/// keep the seed as their best point.
pub(crate) fn nelder_mead<O: SimplexObjective>(
  objective: O,
  x0: Vec<f64>,
  config: &OptimizerConfig,
) -> Solve {
  let problem = SoftmaxProblem { objective };
  let seed_cost = problem.eval(&x0);
  let failed = |x: Vec<f64>, reason: String| Solve {
    x,
    cost: seed_cost,
    converged: false,
    iterations: 0,
    termination: reason,
  };

  let solver = match NelderMead::new(initial_simplex(&x0, config.initial_step))
    .with_sd_tolerance(config.sd_tolerance)
  {
    Ok(solver) => solver,
    Err(err) => return failed(x0, err.to_string()),
  };

  let mut executor =
    Executor::new(problem, solver).configure(|state| state.max_iters(config.max_iters));
  if let Some(ms) = config.timeout_ms {
    executor = executor.timeout(Duration::from_millis(ms));
  }

  match executor.run() {
    Ok(res) => {
      let state = res.state;
      let converged = matches!(
        state.termination_status,
        TerminationStatus::Terminated(
          TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
      );
      let termination = match &state.termination_status {
        TerminationStatus::Terminated(reason) => format!("{reason:?}"),
        TerminationStatus::NotTerminated => "NotTerminated".to_string(),
      };
      let (x, cost) = match state.best_param {
        Some(x) => (x, state.best_cost),
        None => (x0, seed_cost),
      };
      Solve {
        x,
        cost,
        converged,
        iterations: state.iter,
        termination,
      }
    }
    Err(err) => failed(x0, err.to_string()),
  }
}

fn restart_points(n: usize, config: &OptimizerConfig) -> Vec<Vec<f64>> {
  let mut rng = StdRng::seed_from_u64(config.restart_seed);
  (0..config.restarts)
    .map(|_| {
      (0..n)
        .map(|_| {
          let z: f64 = StandardNormal.sample(&mut rng);
          z * config.initial_step
        })
        .collect()
    })
    .collect()
}

fn solve_objective(
  objective: Objective,
  market: &MarketInputs,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Solve {
  let n = market.n_instruments();
  let x0 = vec![0.0; n];
  match objective {
    Objective::MinVariance => nelder_mead(
      VarianceCost {
        cov: market.cov().to_owned(),
      },
      x0,
      config,
    ),
    Objective::MaxSharpe => nelder_mead(
      NegSharpeCost {
        mean: market.mean().to_owned(),
        cov: market.cov().to_owned(),
        risk_free,
      },
      x0,
      config,
    ),
    Objective::MaxSortino => {
      let cost = || NegSortinoCost {
        mean: market.mean().to_owned(),
        returns: market.returns().to_owned(),
        risk_free,
        periods_per_year: market.periods_per_year(),
      };
      let mut best = nelder_mead(cost(), x0, config);
      for (i, seed) in restart_points(n, config).into_iter().enumerate() {
        let candidate = nelder_mead(cost(), seed, config);
        debug!(
          restart = i + 1,
          cost = candidate.cost,
          converged = candidate.converged,
          "sortino restart finished"
        );
        if candidate.better_than(&best) {
          best = candidate;
        }
      }
      best
    }
  }
}

/// Solve `objective` and always return the best iterate with its convergence
/// flag. Use the typed entry points to turn non-convergence into an error.
pub fn optimize_with_objective(
  objective: Objective,
  market: &MarketInputs,
  risk_free: f64,
  config: &OptimizerConfig,
) -> OptimizedPortfolio {
  let solve = solve_objective(objective, market, risk_free, config);
  debug!(
    %objective,
    iterations = solve.iterations,
    termination = %solve.termination,
    cost = solve.cost,
    "solver finished"
  );
  if !solve.converged {
    warn!(
      %objective,
      iterations = solve.iterations,
      termination = %solve.termination,
      "solver did not converge"
    );
  }

  OptimizedPortfolio {
    stats: PortfolioStats::compute(solve.weights(), market, risk_free),
    objective: objective.sign() * solve.cost,
    converged: solve.converged,
    iterations: solve.iterations,
    termination: solve.termination,
  }
}

fn require_converged(
  objective: Objective,
  result: OptimizedPortfolio,
) -> Result<OptimizedPortfolio> {
  if result.converged {
    Ok(result)
  } else {
    Err(PortfolioError::OptimizationFailure {
      objective: objective.to_string(),
      reason: result.termination.clone(),
      best: Box::new(result),
    })
  }
}

/// Global minimum-variance portfolio. `risk_free` only enters the reported
/// ratios; the weights do not depend on it.
pub fn minimize_variance(
  market: &MarketInputs,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Result<OptimizedPortfolio> {
  let objective = Objective::MinVariance;
  require_converged(objective, optimize_with_objective(objective, market, risk_free, config))
}

/// Tangency portfolio under the covariance risk model.
pub fn maximize_sharpe(
  market: &MarketInputs,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Result<OptimizedPortfolio> {
  let objective = Objective::MaxSharpe;
  require_converged(objective, optimize_with_objective(objective, market, risk_free, config))
}

/// Maximum Sortino portfolio. The objective is non-smooth, so
/// [`OptimizerConfig::restarts`] may be raised to try further seeds.
pub fn maximize_sortino(
  market: &MarketInputs,
  risk_free: f64,
  config: &OptimizerConfig,
) -> Result<OptimizedPortfolio> {
  let objective = Objective::MaxSortino;
  require_converged(objective, optimize_with_objective(objective, market, risk_free, config))
}
