//! # Random Portfolio Sampler
//!
//! $$
//! u_i\sim\mathcal U(0,1),\quad w_i=\frac{u_i}{\sum_j u_j}
//! \qquad\text{or}\qquad
//! e_i\sim\operatorname{Exp}(1),\quad w_i=\frac{e_i}{\sum_j e_j}
//! $$
//!
//! Monte Carlo cloud of long-only portfolios. The box scheme clusters around
//! the centroid of the simplex; the exponential scheme is Dirichlet(1, …, 1)
//! and therefore uniform on it.

use ndarray::Array1;
use ndarray_rand::rand_distr::Exp1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::market::MarketInputs;
use super::types::PortfolioStats;
use super::types::RiskModel;
use super::types::WeightVector;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingScheme {
  /// Independent `U(0,1)` draws normalized by their sum.
  #[default]
  UniformBox,
  /// Normalized `Exp(1)` draws, uniform on the simplex.
  Dirichlet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
  pub scheme: SamplingScheme,
  /// Fixes the draws; entropy-seeded when absent.
  pub seed: Option<u64>,
}

/// Sampled portfolios in draw order, tagged with the ratio used to rank them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleSet {
  pub risk_model: RiskModel,
  pub portfolios: Vec<PortfolioStats>,
}

impl SampleSet {
  pub fn len(&self) -> usize {
    self.portfolios.len()
  }

  pub fn is_empty(&self) -> bool {
    self.portfolios.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, PortfolioStats> {
    self.portfolios.iter()
  }

  /// Highest ratio under the set's risk model; the earliest draw wins ties.
  pub fn best(&self) -> Option<&PortfolioStats> {
    self.portfolios.iter().fold(None, |best, p| match best {
      Some(b) if b.ratio(self.risk_model) >= p.ratio(self.risk_model) => Some(b),
      Some(b) if p.ratio(self.risk_model).is_nan() => Some(b),
      _ => Some(p),
    })
  }

  /// Lowest and highest sampled expected return.
  pub fn return_range(&self) -> Option<(f64, f64)> {
    self.portfolios.iter().map(|p| p.expected_return).fold(None, |acc, r| {
      Some(match acc {
        None => (r, r),
        Some((lo, hi)) => (lo.min(r), hi.max(r)),
      })
    })
  }
}

#[derive(Clone, Debug, Default)]
pub struct RandomPortfolioSampler {
  config: SamplerConfig,
}

impl RandomPortfolioSampler {
  pub fn new(config: SamplerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SamplerConfig {
    &self.config
  }

  /// Draw `n` portfolios and evaluate them. Degenerate draws are kept.
  pub fn sample(
    &self,
    n: usize,
    market: &MarketInputs,
    risk_free: f64,
    risk_model: RiskModel,
  ) -> SampleSet {
    let mut rng = match self.config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let n_assets = market.n_instruments();
    let portfolios = (0..n)
      .map(|_| market.stats(draw_weights(self.config.scheme, n_assets, &mut rng), risk_free))
      .collect();
    self.finish(n, risk_model, portfolios)
  }

  /// [`Self::sample`] on the rayon pool. Draw `i` uses its own generator
  /// seeded from `seed + i`, so output is reproducible but differs from the
  /// sequential stream.
  pub fn sample_par(
    &self,
    n: usize,
    market: &MarketInputs,
    risk_free: f64,
    risk_model: RiskModel,
  ) -> SampleSet {
    let base = self.config.seed.unwrap_or_else(rand::random::<u64>);
    let scheme = self.config.scheme;
    let n_assets = market.n_instruments();
    let portfolios = (0..n)
      .into_par_iter()
      .map(|i| {
        let mut rng = StdRng::seed_from_u64(base.wrapping_add(i as u64));
        market.stats(draw_weights(scheme, n_assets, &mut rng), risk_free)
      })
      .collect();
    self.finish(n, risk_model, portfolios)
  }

  fn finish(&self, n: usize, risk_model: RiskModel, portfolios: Vec<PortfolioStats>) -> SampleSet {
    let set = SampleSet {
      risk_model,
      portfolios,
    };
    let degenerate = set
      .iter()
      .filter(|p| !p.degeneracies().is_empty())
      .count();
    info!(
      samples = n,
      scheme = ?self.config.scheme,
      degenerate,
      "simulated random portfolios"
    );
    set
  }
}

fn draw_weights<R: Rng + ?Sized>(scheme: SamplingScheme, n: usize, rng: &mut R) -> WeightVector {
  let raw: Array1<f64> = match scheme {
    SamplingScheme::UniformBox => Array1::random_using(n, Uniform::new(0.0, 1.0), rng),
    SamplingScheme::Dirichlet => Array1::random_using(n, Exp1, rng),
  };
  WeightVector::from_unnormalized(raw.as_slice().unwrap_or(&[]))
}
