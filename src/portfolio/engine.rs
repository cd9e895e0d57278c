//! # Portfolio Engine
//!
//! $$
//! P \;\to\; (\mu,\Sigma,R) \;\to\; \{\text{samples},\ \mathbf w_{\min\sigma},\ \mathbf w^\*,\ \sigma^\*(r)\}
//! $$
//!
//! End-to-end pipeline: market inputs, a random cloud, the minimum-variance
//! and maximum-ratio portfolios, and the efficient frontier across the
//! sampled return range. All settings come from [`PortfolioEngineConfig`].

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::frontier::linspace;
use super::frontier::trace_frontier;
use super::frontier::FrontierConfig;
use super::frontier::ReturnBounds;
use super::market::MarketInputs;
use super::optimizers::optimize_with_objective;
use super::optimizers::Objective;
use super::optimizers::OptimizerConfig;
use super::report::assemble_report;
use super::report::PortfolioReport;
use super::sampler::RandomPortfolioSampler;
use super::sampler::SampleSet;
use super::sampler::SamplerConfig;
use super::types::FrontierPoint;
use super::types::OptimizedPortfolio;
use super::types::RiskModel;
use crate::data::DateRange;
use crate::data::PriceHistory;
use crate::data::PriceHistoryProvider;
use crate::error::DateSpan;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::TRADING_DAYS;

/// What to do when an optimizer does not converge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
  /// Record a warning and leave the portfolio out.
  #[default]
  Skip,
  /// Report the best iterate flagged as not converged.
  AcceptBestIterate,
  /// Return the failure to the caller.
  Abort,
}

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioEngineConfig {
  /// Annualized risk-free rate.
  pub risk_free: f64,
  /// Return periods per year used for annualization.
  pub periods_per_year: f64,
  /// Ratio maximized for the optimal portfolio and used to rank samples.
  pub objective: RiskModel,
  /// Number of random portfolios.
  pub samples: usize,
  /// Number of frontier targets.
  pub frontier_points: usize,
  /// Decimal places kept for report weights.
  pub report_decimals: u32,
  pub failure_policy: FailurePolicy,
  /// Use the rayon variants for sampling and the frontier.
  pub parallel: bool,
  pub sampler: SamplerConfig,
  pub optimizer: OptimizerConfig,
  pub frontier: FrontierConfig,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.05,
      periods_per_year: TRADING_DAYS,
      objective: RiskModel::Sharpe,
      samples: 5000,
      frontier_points: 100,
      report_decimals: 4,
      failure_policy: FailurePolicy::Skip,
      parallel: false,
      sampler: SamplerConfig::default(),
      optimizer: OptimizerConfig::default(),
      frontier: FrontierConfig::default(),
    }
  }
}

/// Everything one run produces.
#[derive(Clone, Debug, Serialize)]
pub struct PortfolioAnalysis {
  pub instruments: Vec<String>,
  pub span: Option<DateSpan>,
  pub samples: SampleSet,
  /// Best sampled portfolio under the configured ratio.
  pub best_sample: Option<PortfolioReport>,
  pub min_variance: Option<PortfolioReport>,
  pub optimal: Option<PortfolioReport>,
  pub frontier: Vec<FrontierPoint>,
  /// Non-fatal problems met during the run.
  pub warnings: Vec<String>,
}

/// Single entry point for the sampling, optimization and frontier workflow.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Annualized market inputs for a price history.
  pub fn market(&self, history: &PriceHistory) -> Result<MarketInputs> {
    MarketInputs::from_history(history, self.config.periods_per_year)
  }

  /// Random portfolio cloud.
  pub fn sample(&self, market: &MarketInputs) -> SampleSet {
    let sampler = RandomPortfolioSampler::new(self.config.sampler);
    let (n, rf, model) = (self.config.samples, self.config.risk_free, self.config.objective);
    if self.config.parallel {
      sampler.sample_par(n, market, rf, model)
    } else {
      sampler.sample(n, market, rf, model)
    }
  }

  /// Solve `objective`, always returning the best iterate.
  pub fn optimize(&self, market: &MarketInputs, objective: Objective) -> OptimizedPortfolio {
    optimize_with_objective(objective, market, self.config.risk_free, &self.config.optimizer)
  }

  /// Minimum volatility per target.
  pub fn frontier(&self, market: &MarketInputs, targets: &[f64]) -> Vec<FrontierPoint> {
    let bounds = ReturnBounds::solve(market, &self.config.optimizer, &self.config.frontier);
    self.frontier_within(market, targets, &bounds)
  }

  fn frontier_within(
    &self,
    market: &MarketInputs,
    targets: &[f64],
    bounds: &ReturnBounds,
  ) -> Vec<FrontierPoint> {
    trace_frontier(
      market,
      targets,
      bounds,
      &self.config.optimizer,
      &self.config.frontier,
      self.config.parallel,
    )
  }

  /// Fetch prices through `provider` and run [`Self::analyze`].
  pub fn analyze_provider<P: PriceHistoryProvider + ?Sized>(
    &self,
    provider: &P,
    instruments: &[String],
    range: &DateRange,
  ) -> Result<PortfolioAnalysis> {
    let history = provider.history(instruments, range)?;
    self.analyze(&history)
  }

  /// Run the full pipeline on a validated price history.
  pub fn analyze(&self, history: &PriceHistory) -> Result<PortfolioAnalysis> {
    let market = self.market(history)?;
    let decimals = self.config.report_decimals;
    let mut warnings = Vec::new();

    let samples = self.sample(&market);
    let best_sample = samples
      .best()
      .map(|stats| assemble_report("best sample", &market, stats, decimals, true));

    let mvp = self.optimize(&market, Objective::MinVariance);
    let bounds = ReturnBounds::new(&market, mvp.stats.expected_return, &self.config.frontier);
    let min_variance = self
      .settle(Objective::MinVariance, mvp, &mut warnings)?
      .map(|p| assemble_report("minimum variance", &market, &p.stats, decimals, p.converged));

    let objective = Objective::maximizing(self.config.objective);
    let label = format!("maximum {}", self.config.objective);
    let optimal = self
      .settle(objective, self.optimize(&market, objective), &mut warnings)?
      .map(|p| assemble_report(&label, &market, &p.stats, decimals, p.converged));

    let targets = match samples.return_range() {
      Some((lo, hi)) => linspace(lo, hi, self.config.frontier_points),
      None => linspace(bounds.lower, bounds.upper, self.config.frontier_points),
    };
    let frontier = self.frontier_within(&market, &targets, &bounds);
    let infeasible = frontier.iter().filter(|p| !p.is_feasible()).count();
    if infeasible > 0 {
      warnings.push(format!("{infeasible} of {} frontier targets infeasible", frontier.len()));
    }

    info!(
      instruments = market.n_instruments(),
      samples = samples.len(),
      frontier = frontier.len(),
      warnings = warnings.len(),
      "portfolio analysis complete"
    );

    Ok(PortfolioAnalysis {
      instruments: market.instruments().to_vec(),
      span: history.span(),
      samples,
      best_sample,
      min_variance,
      optimal,
      frontier,
      warnings,
    })
  }

  /// Apply the failure policy to one solve.
  fn settle(
    &self,
    objective: Objective,
    result: OptimizedPortfolio,
    warnings: &mut Vec<String>,
  ) -> Result<Option<OptimizedPortfolio>> {
    if result.converged {
      return Ok(Some(result));
    }

    let message = format!(
      "{objective} did not converge ({}) after {} iterations",
      result.termination, result.iterations
    );
    match self.config.failure_policy {
      FailurePolicy::Skip => {
        warn!(%objective, "skipping unconverged portfolio");
        warnings.push(message);
        Ok(None)
      }
      FailurePolicy::AcceptBestIterate => {
        warn!(%objective, "reporting unconverged best iterate");
        warnings.push(message);
        Ok(Some(result))
      }
      FailurePolicy::Abort => Err(PortfolioError::OptimizationFailure {
        objective: objective.to_string(),
        reason: result.termination.clone(),
        best: Box::new(result),
      }),
    }
  }
}
