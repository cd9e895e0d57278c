use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use frontier_rs::data::CsvPriceProvider;
use frontier_rs::data::DateRange;
use frontier_rs::portfolio::PortfolioAnalysis;
use frontier_rs::portfolio::PortfolioEngine;
use frontier_rs::portfolio::PortfolioEngineConfig;
use frontier_rs::portfolio::PortfolioReport;
use frontier_rs::portfolio::RiskModel;
use frontier_rs::portfolio::SamplingScheme;
use prettytable::row;
use prettytable::Table;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Random portfolios, optimal long-only allocations and the efficient frontier from daily closes",
  after_help = "EXAMPLES:
    frontier --prices closes.csv
    frontier --prices closes.csv --instruments AAPL,MSFT,GOOG --start 2023-01-01 --objective sortino
    frontier --prices closes.csv --config run.json --json > analysis.json"
)]
struct Args {
  /// CSV of daily closes with header `date,<id>,<id>,...`
  #[arg(long)]
  prices: PathBuf,

  /// Comma-separated instruments to keep (default: every column)
  #[arg(long, value_delimiter = ',')]
  instruments: Vec<String>,

  /// First date included (YYYY-MM-DD)
  #[arg(long)]
  start: Option<NaiveDate>,

  /// Last date included (YYYY-MM-DD)
  #[arg(long)]
  end: Option<NaiveDate>,

  /// JSON engine configuration; flags below override it
  #[arg(long)]
  config: Option<PathBuf>,

  /// Annualized risk-free rate
  #[arg(long)]
  risk_free: Option<f64>,

  /// Ratio to maximize: sharpe or sortino
  #[arg(long, value_parser = parse_risk_model)]
  objective: Option<RiskModel>,

  /// Number of random portfolios
  #[arg(long)]
  samples: Option<usize>,

  /// Number of frontier targets
  #[arg(long)]
  frontier_points: Option<usize>,

  /// Seed for the random portfolios
  #[arg(long)]
  seed: Option<u64>,

  /// Sample uniformly on the simplex instead of normalizing uniform draws
  #[arg(long)]
  dirichlet: bool,

  /// Solve samples and frontier targets on all cores
  #[arg(long)]
  parallel: bool,

  /// Print the full analysis as JSON
  #[arg(long)]
  json: bool,
}

fn parse_risk_model(s: &str) -> std::result::Result<RiskModel, String> {
  s.parse::<RiskModel>().map_err(|e| e.to_string())
}

fn engine_config(args: &Args) -> Result<PortfolioEngineConfig> {
  let mut config = match &args.config {
    Some(path) => {
      let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
      serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    }
    None => PortfolioEngineConfig::default(),
  };

  if let Some(rf) = args.risk_free {
    config.risk_free = rf;
  }
  if let Some(objective) = args.objective {
    config.objective = objective;
  }
  if let Some(samples) = args.samples {
    config.samples = samples;
  }
  if let Some(points) = args.frontier_points {
    config.frontier_points = points;
  }
  if args.seed.is_some() {
    config.sampler.seed = args.seed;
  }
  if args.dirichlet {
    config.sampler.scheme = SamplingScheme::Dirichlet;
  }
  config.parallel |= args.parallel;
  Ok(config)
}

fn pct(x: f64) -> String {
  format!("{:.2}%", 100.0 * x)
}

fn print_summary(analysis: &PortfolioAnalysis) {
  let reports: Vec<&PortfolioReport> = [
    &analysis.min_variance,
    &analysis.optimal,
    &analysis.best_sample,
  ]
  .into_iter()
  .flatten()
  .collect();

  let mut summary = Table::new();
  summary.add_row(row![
    "Portfolio",
    "Return",
    "Volatility",
    "Downside",
    "Sharpe",
    "Sortino",
    "Converged"
  ]);
  for r in &reports {
    summary.add_row(row![
      r.label,
      pct(r.expected_return),
      pct(r.volatility),
      pct(r.downside_deviation),
      format!("{:.4}", r.sharpe),
      format!("{:.4}", r.sortino),
      r.converged
    ]);
  }
  summary.printstd();

  if let Some(optimal) = &analysis.optimal {
    println!("\n{} weights", optimal.label);
    let mut weights = Table::new();
    weights.add_row(row!["Instrument", "Weight"]);
    for a in &optimal.allocations {
      weights.add_row(row![a.instrument, pct(a.weight)]);
    }
    weights.printstd();
  }

  let feasible: Vec<(f64, f64)> = analysis
    .frontier
    .iter()
    .filter_map(|p| p.volatility().map(|v| (p.target_return, v)))
    .collect();
  println!(
    "\nefficient frontier: {} of {} targets feasible",
    feasible.len(),
    analysis.frontier.len()
  );
  if let (Some(first), Some(last)) = (feasible.first(), feasible.last()) {
    println!(
      "  from {} at {} volatility to {} at {} volatility",
      pct(first.0),
      pct(first.1),
      pct(last.0),
      pct(last.1)
    );
  }
}

fn main() -> Result<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = engine_config(&args)?;
  let engine = PortfolioEngine::new(config);
  let provider = CsvPriceProvider::new(&args.prices);
  let range = DateRange::new(args.start, args.end);

  let analysis = engine
    .analyze_provider(&provider, &args.instruments, &range)
    .with_context(|| format!("analyzing {}", args.prices.display()))?;

  if let Some(span) = analysis.span {
    info!(%span, instruments = analysis.instruments.len(), "price history");
  }
  for w in &analysis.warnings {
    warn!("{w}");
  }

  if args.json {
    println!("{}", serde_json::to_string_pretty(&analysis)?);
  } else {
    print_summary(&analysis);
  }
  Ok(())
}
