//! # Portfolio
//!
//! $$
//! \min_{\mathbf w\in\Delta^{n-1}} f(\mathbf w),\qquad \Delta^{n-1}=\{\mathbf w\ge 0,\ \mathbf 1^\top\mathbf w=1\}
//! $$
//!
//! Long-only allocation over the probability simplex: random sampling,
//! Nelder–Mead optimizers, the efficient frontier and result reports.

pub mod engine;
pub mod frontier;
pub mod market;
pub mod optimizers;
pub mod report;
pub mod sampler;
pub mod types;

pub use engine::FailurePolicy;
pub use engine::PortfolioAnalysis;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use frontier::FrontierConfig;
pub use frontier::efficient_frontier;
pub use frontier::efficient_frontier_par;
pub use frontier::frontier_targets;
pub use frontier::linspace;
pub use frontier::trace_frontier;
pub use frontier::ReturnBounds;
pub use market::MarketInputs;
pub use optimizers::Objective;
pub use optimizers::OptimizerConfig;
pub use optimizers::maximize_sharpe;
pub use optimizers::maximize_sortino;
pub use optimizers::minimize_variance;
pub use optimizers::optimize_with_objective;
pub use report::Allocation;
pub use report::PortfolioReport;
pub use report::assemble_report;
pub use report::rank_reports;
pub use sampler::RandomPortfolioSampler;
pub use sampler::SampleSet;
pub use sampler::SamplerConfig;
pub use sampler::SamplingScheme;
pub use types::DegenerateMetric;
pub use types::FrontierAttempt;
pub use types::FrontierOutcome;
pub use types::FrontierPoint;
pub use types::OptimizedPortfolio;
pub use types::PortfolioStats;
pub use types::RiskModel;
pub use types::WeightVector;
