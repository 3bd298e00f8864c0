use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evoport::{
    report, EvolutionConfig, GeneticOptimizer, MarketStatistics, PortfolioSummary, PriceHistory,
};

/// Evolve a portfolio allocation from a close-price CSV.
#[derive(Parser, Debug)]
#[command(name = "evoport", version, about)]
struct Cli {
    /// Close-price CSV: a `date` column followed by one column per ticker.
    prices: PathBuf,

    #[arg(long, default_value_t = 100)]
    generations: usize,

    #[arg(long, default_value_t = 50)]
    population: usize,

    /// Concentration-penalty weight (alpha).
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// Volatility-penalty weight (beta).
    #[arg(long, default_value_t = 1.0)]
    beta: f64,

    #[arg(long, default_value_t = 0.02)]
    risk_free_rate: f64,

    #[arg(long, default_value_t = 0.05)]
    min_weight: f64,

    #[arg(long, default_value_t = 0.5)]
    max_weight: f64,

    /// Seed the run for bit-reproducible results.
    #[arg(long)]
    seed: Option<u64>,

    /// Amount to allocate in the summary projections.
    #[arg(long, default_value_t = 500_000_000.0)]
    investment: f64,

    /// First date of the training window (inclusive).
    #[arg(long)]
    train_start: Option<NaiveDate>,

    /// Last date of the training window (inclusive).
    #[arg(long)]
    train_end: Option<NaiveDate>,

    /// First date of the held-out validation window (inclusive).
    #[arg(long)]
    test_start: Option<NaiveDate>,

    /// Last date of the held-out validation window (inclusive).
    #[arg(long)]
    test_end: Option<NaiveDate>,

    /// Print the full generation-indexed fitness table.
    #[arg(long)]
    history: bool,

    /// Print the recorded best weights of one generation (1-based).
    #[arg(long)]
    show_generation: Option<usize>,

    /// Write the full evolution result as JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let history = PriceHistory::from_csv_path(&cli.prices)
        .with_context(|| format!("loading prices from {}", cli.prices.display()))?;
    info!(
        tickers = history.tickers().len(),
        rows = history.num_rows(),
        "loaded price history"
    );

    let train = history
        .window(cli.train_start, cli.train_end)
        .context("slicing the training window")?;
    let train_returns = train.daily_returns();
    let stats =
        MarketStatistics::from_return_series(&train_returns).context("deriving statistics")?;

    let config = EvolutionConfig {
        risk_free_rate: cli.risk_free_rate,
        population_size: cli.population,
        generations: cli.generations,
        concentration_penalty_weight: cli.alpha,
        volatility_penalty_weight: cli.beta,
        min_weight: cli.min_weight,
        max_weight: cli.max_weight,
        seed: cli.seed,
        ..EvolutionConfig::default()
    };

    let mut optimizer =
        GeneticOptimizer::new(stats, config).context("building the optimizer")?;
    info!(
        generations = cli.generations,
        population = cli.population,
        "starting evolution"
    );
    let result = optimizer.run();
    info!(
        best_fitness = result.best_fitness,
        best_generation = result.best_generation + 1,
        "evolution finished"
    );

    println!(
        "{}",
        report::allocation_table(history.tickers(), &result.best_weights, cli.investment)
    );

    let train_summary =
        PortfolioSummary::from_returns(&result.best_weights, &train_returns, cli.investment)
            .context("summarizing the training window")?;
    println!("{}", report::summary_block("training window", &train_summary));

    if cli.test_start.is_some() || cli.test_end.is_some() {
        let test = history
            .window(cli.test_start, cli.test_end)
            .context("slicing the validation window")?;
        let test_summary = PortfolioSummary::from_returns(
            &result.best_weights,
            &test.daily_returns(),
            cli.investment,
        )
        .context("summarizing the validation window")?;
        println!("{}", report::summary_block("validation window", &test_summary));
    }

    if cli.history {
        println!("{}", report::history_table(&result));
    }

    if let Some(generation) = cli.show_generation {
        match report::weights_of_generation(&result, generation) {
            Some(rendered) => println!("{rendered}"),
            None => println!(
                "generation {generation} is out of range (1..={})",
                cli.generations
            ),
        }
    }

    if let Some(path) = &cli.output {
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &result).context("serializing the result")?;
        info!(path = %path.display(), "wrote evolution result");
    }

    Ok(())
}
