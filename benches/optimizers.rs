use std::hint::black_box;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use frontier_rs::portfolio::efficient_frontier;
use frontier_rs::portfolio::efficient_frontier_par;
use frontier_rs::portfolio::linspace;
use frontier_rs::portfolio::maximize_sharpe;
use frontier_rs::portfolio::minimize_variance;
use frontier_rs::portfolio::FrontierConfig;
use frontier_rs::portfolio::MarketInputs;
use frontier_rs::portfolio::OptimizerConfig;
use frontier_rs::portfolio::RandomPortfolioSampler;
use frontier_rs::portfolio::RiskModel;
use frontier_rs::portfolio::SamplerConfig;
use frontier_rs::stats::ReturnSeries;
use ndarray::Array2;

/// Deterministic pseudo-returns with a shared factor so the covariance is dense.
fn synthetic_market(n: usize, periods: usize) -> MarketInputs {
  let returns = Array2::from_shape_fn((periods, n), |(t, i)| {
    let factor = ((t as f64) * 0.37).sin() * 0.01;
    let idio = ((t * (i + 3)) as f64 * 1.13).cos() * 0.004 * (1.0 + i as f64 * 0.1);
    0.0003 * (i + 1) as f64 + factor * (0.5 + 0.1 * i as f64) + idio
  });
  let names = (0..n).map(|i| format!("S{i}")).collect();
  let series = ReturnSeries::new(names, vec![], returns).expect("valid synthetic returns");
  MarketInputs::from_returns(&series, 252.0).expect("valid synthetic market")
}

fn bench_optimizers(c: &mut Criterion) {
  let config = OptimizerConfig::default();
  let mut group = c.benchmark_group("optimizers");
  for n in [3usize, 8, 16] {
    let market = synthetic_market(n, 500);
    group.bench_with_input(BenchmarkId::new("min_variance", n), &market, |b, m| {
      b.iter(|| black_box(minimize_variance(black_box(m), 0.05, &config).ok()))
    });
    group.bench_with_input(BenchmarkId::new("max_sharpe", n), &market, |b, m| {
      b.iter(|| black_box(maximize_sharpe(black_box(m), 0.05, &config).ok()))
    });
  }
  group.finish();
}

fn bench_frontier(c: &mut Criterion) {
  let market = synthetic_market(6, 500);
  let optimizer = OptimizerConfig::default();
  let frontier = FrontierConfig::default();
  let targets = linspace(market.min_mean(), market.max_mean(), 20);

  c.bench_function("frontier_20_serial", |b| {
    b.iter(|| black_box(efficient_frontier(&market, black_box(&targets), &optimizer, &frontier)))
  });
  c.bench_function("frontier_20_parallel", |b| {
    b.iter(|| {
      black_box(efficient_frontier_par(
        &market,
        black_box(&targets),
        &optimizer,
        &frontier,
      ))
    })
  });
}

fn bench_sampler(c: &mut Criterion) {
  let market = synthetic_market(10, 500);
  let sampler = RandomPortfolioSampler::new(SamplerConfig {
    seed: Some(7),
    ..SamplerConfig::default()
  });

  c.bench_function("sample_5000", |b| {
    b.iter(|| black_box(sampler.sample(5000, &market, 0.05, RiskModel::Sharpe)))
  });
  c.bench_function("sample_par_5000", |b| {
    b.iter(|| black_box(sampler.sample_par(5000, &market, 0.05, RiskModel::Sharpe)))
  });
}

criterion_group!(benches, bench_optimizers, bench_frontier, bench_sampler);
criterion_main!(benches);
