use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::Parser;
use neatrade::application::simulation::population::{PopulationEvaluator, ranking};
use neatrade::application::simulation::replay::Replay;
use neatrade::config::Config;
use neatrade::domain::market::candle::CandlesData;
use neatrade::domain::market::timeframe::Timeframe;
use neatrade::domain::ports::{ConversionRateProvider, DecisionSource};
use neatrade::infrastructure::conversion_rates::{FixedConversionRate, HistoricalConversionRates};
use neatrade::infrastructure::csv_candles::load_candles;
use neatrade::infrastructure::random_decisions::RandomDecisionSource;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Decision vector layout: long, short, close
const DECISION_OUTPUTS: usize = 3;

#[derive(Parser)]
#[command(author, version, about = "Backtest a population of baseline agents", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = "config/eurusd_h1.toml")]
    config: PathBuf,

    /// Candle CSV per timeframe, as TIMEFRAME=PATH (e.g. H1=data/eurusd_h1.csv). Repeatable.
    #[arg(long = "candles", required = true)]
    candles: Vec<String>,

    /// CSV of historical conversion rates (date,rate). Defaults to a rate of 1.
    #[arg(long)]
    conversion_rates: Option<PathBuf>,

    /// Override neuroevolution.population_size
    #[arg(short, long)]
    population: Option<usize>,

    /// Seed of the first agent; agent i uses seed + i
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Replay the test window instead of the training window
    #[arg(long)]
    test: bool,

    /// Number of ranked agents to print
    #[arg(long, default_value = "10")]
    top: usize,

    /// Write every evaluation as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_candles_arg(arg: &str) -> anyhow::Result<(Timeframe, PathBuf)> {
    let (timeframe, path) = arg
        .split_once('=')
        .with_context(|| format!("--candles expects TIMEFRAME=PATH, got '{}'", arg))?;
    let timeframe = Timeframe::from_str(timeframe.trim())?;
    Ok((timeframe, PathBuf::from(path.trim())))
}

fn window(config: &Config, test: bool) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let training = &config.training;
    if !test {
        return Ok((training.training_start_date, training.training_end_date));
    }
    match (training.test_start_date, training.test_end_date) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => bail!("--test requires training.test_start_date and training.test_end_date"),
    }
}

fn day_bounds(start: NaiveDate, end: NaiveDate) -> anyhow::Result<(i64, i64)> {
    let start = start
        .and_hms_opt(0, 0, 0)
        .context("invalid start date")?
        .and_utc()
        .timestamp();
    let end = end
        .and_hms_opt(23, 59, 59)
        .context("invalid end date")?
        .and_utc()
        .timestamp();
    Ok((start, end))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(population) = cli.population {
        config.neuroevolution.population_size = population;
        config.validate()?;
    }
    let config = Arc::new(config);
    info!(
        "Loaded config '{}' for {} ({} traders)",
        config.general.name, config.general.symbol, config.neuroevolution.population_size
    );

    let mut series = CandlesData::new();
    for arg in &cli.candles {
        let (timeframe, path) = parse_candles_arg(arg)?;
        series.insert(timeframe, load_candles(&path)?);
    }

    let rates: Box<dyn ConversionRateProvider> = match &cli.conversion_rates {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open conversion rates {}", path.display()))?;
            Box::new(HistoricalConversionRates::from_csv(BufReader::new(file))?)
        }
        None => Box::new(FixedConversionRate::identity()),
    };

    let (start, end) = window(&config, cli.test)?;
    let (start_ts, end_ts) = day_bounds(start, end)?;
    let replay = Replay::new(&config, series, rates.as_ref(), start_ts, end_ts)
        .context("Failed to build market replay")?;
    if replay.is_empty() {
        bail!("No candles between {} and {}", start, end);
    }

    let sources: Vec<Box<dyn DecisionSource>> = (0..config.neuroevolution.population_size)
        .map(|i| {
            Box::new(RandomDecisionSource::new(cli.seed + i as u64, DECISION_OUTPUTS))
                as Box<dyn DecisionSource>
        })
        .collect();

    let evaluator = PopulationEvaluator::new(config.clone(), Arc::new(replay));
    let evaluations = evaluator.evaluate(sources)?;

    println!(
        "{:>5} {:>10} {:>10} {:>8} {:>9} {:>9} {:>8}",
        "agent", "fitness", "score", "trades", "winrate", "return%", "maxdd%"
    );
    for index in ranking(&evaluations).into_iter().take(cli.top) {
        let evaluation = &evaluations[index];
        match &evaluation.result {
            Ok(result) => {
                let stats = &result.report.statistics;
                println!(
                    "{:>5} {:>10.4} {:>10.2} {:>8} {:>9.2} {:>9.2} {:>8.2}",
                    evaluation.index,
                    evaluation.fitness,
                    evaluation.score,
                    stats.total_trades,
                    stats.win_rate,
                    stats.total_return_pct,
                    stats.max_drawdown_pct
                );
            }
            Err(e) => println!("{:>5} failed: {}", evaluation.index, e),
        }
    }

    if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &evaluations)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {} evaluations to {}", evaluations.len(), path.display());
    }

    Ok(())
}
