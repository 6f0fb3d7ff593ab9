use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use portfolio_rs::config::EngineConfig;
use portfolio_rs::data::load_observations;
use portfolio_rs::engine::run_allocation;
use portfolio_rs::engine::AllocationRequest;
use portfolio_rs::portfolio::load_linear_models;
use portfolio_rs::portfolio::ModelMap;
use portfolio_rs::report::save_json;
use tracing::info;
use tracing::warn;

#[derive(Parser)]
#[command(name = "portfolio-rs")]
#[command(about = "Mean-variance and prediction-weighted allocation with backtesting")]
struct Cli {
  /// Long-format CSV with at least Date, Close and ticker columns
  #[arg(short, long, value_name = "CSV")]
  data: PathBuf,

  /// Portfolio tickers, comma separated
  #[arg(short, long, value_delimiter = ',', required = true)]
  tickers: Vec<String>,

  /// Benchmark ticker
  #[arg(short, long)]
  benchmark: String,

  /// First date to use (YYYY-MM-DD)
  #[arg(long)]
  start: Option<NaiveDate>,

  /// Last date to use (YYYY-MM-DD)
  #[arg(long)]
  end: Option<NaiveDate>,

  /// TOML engine configuration
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// JSON file of fitted linear models keyed by ticker
  #[arg(short, long)]
  models: Option<PathBuf>,

  /// Write the report here instead of printing it
  #[arg(short, long)]
  output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .init();

  let cli = Cli::parse();

  let config = match &cli.config {
    Some(path) => EngineConfig::from_toml_file(path)
      .with_context(|| format!("loading configuration from {}", path.display()))?,
    None => EngineConfig::default(),
  };

  let observations = load_observations(&cli.data)
    .with_context(|| format!("reading market data from {}", cli.data.display()))?;

  let models = match &cli.models {
    Some(path) => load_linear_models(path)
      .with_context(|| format!("loading models from {}", path.display()))?,
    None => ModelMap::new(),
  };

  let request = AllocationRequest {
    tickers: cli.tickers,
    benchmark: cli.benchmark,
    start: cli.start,
    end: cli.end,
  };
  let report = run_allocation(&observations, &request, &models, &config)
    .context("running allocation")?;

  for failure in &report.failures {
    warn!("{} ({:?}): {}", failure.strategy, failure.stage, failure.message);
  }

  match &cli.output {
    Some(path) => {
      save_json(&report, path).with_context(|| format!("writing {}", path.display()))?;
      info!("Done");
    }
    None => println!("{}", report.to_json()?),
  }

  Ok(())
}
