//! ForecastLab CLI — fetch, feature-building, training and scenario commands.
//!
//! Commands:
//! - `fetch-eia` — pull one EIA v2 series and write it as `date,<column>` CSV
//! - `fetch-agsi` — pull AGSI+ aggregated storage and write it as `date,level_pct` CSV
//! - `merge-ais` — count AIS vessel events per day into an auxiliary source file
//! - `build-features` — align sources, synthesize features and targets, write the table
//! - `train` — walk-forward backtest and refit every (horizon, model) from the saved table
//! - `run` — `build-features` followed by `train`, in one process
//! - `scenario` — re-predict recent rows under additive feature shocks

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use forecastlab_core::data::{
    aggregate_ais, read_series_csv, write_series_csv, AgsiClient, AgsiQuery, AisOptions,
    DataError, EiaClient, EiaQuery,
};
use forecastlab_runner::scenario::DEFAULT_SCENARIO_ROWS;
use forecastlab_runner::{ModelKind, PipelineConfig, RunSummary, ShockSet};

#[derive(Parser)]
#[command(
    name = "forecastlab",
    about = "ForecastLab CLI — leakage-safe daily features and walk-forward forecasting"
)]
struct Cli {
    /// Pipeline config (TOML).
    #[arg(long, global = true, default_value = "forecastlab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one EIA v2 series (needs EIA_API_KEY) and write it as CSV.
    FetchEia {
        /// Route under the v2 root, e.g. natural-gas/pri/fut/data.
        #[arg(long)]
        route: String,

        /// Series facet, e.g. RNGWHHD.
        #[arg(long)]
        series: String,

        /// Output column name.
        #[arg(long)]
        column: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2015-01-01")]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to the latest available.
        #[arg(long)]
        end: Option<String>,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Fetch AGSI+ gas storage fill levels (needs AGSI_API_KEY) and write them as CSV.
    FetchAgsi {
        /// Country or region code.
        #[arg(long, default_value = "EU")]
        country: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2017-01-01")]
        from: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        to: Option<String>,

        /// `date,level_pct` CSV copied to the output when no API key is set.
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Output CSV path.
        #[arg(long, default_value = "data/external/eu_storage.csv")]
        out: PathBuf,
    },
    /// Aggregate AIS vessel-event CSVs into daily counts.
    MergeAis {
        /// Event CSV files (repeatable).
        #[arg(long = "input", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Timestamp column; time, datetime and ts are tried when absent.
        #[arg(long, default_value = "timestamp")]
        time_col: String,

        /// Event type column; departures and arrivals match DEP and ARR.
        #[arg(long, default_value = "event_type")]
        event_col: String,

        /// Output CSV path.
        #[arg(long, default_value = "data/external/ais_daily.csv")]
        out: PathBuf,
    },
    /// Build and persist the trainable feature table.
    BuildFeatures {
        #[command(flatten)]
        overrides: TrainingOverrides,
    },
    /// Backtest and refit every configured model from the saved feature table.
    Train {
        #[command(flatten)]
        overrides: TrainingOverrides,
    },
    /// Build features and train in one go.
    Run {
        #[command(flatten)]
        overrides: TrainingOverrides,
    },
    /// Re-predict the most recent rows with shocked features.
    Scenario {
        /// Model id: mean, ridge, rf, gbm (hgb is accepted for gbm).
        #[arg(long)]
        model: ModelKind,

        /// Forecast horizon in days.
        #[arg(long)]
        horizon: u32,

        /// JSON object of column deltas, or @path to a JSON file.
        #[arg(long, default_value = "{}")]
        shocks: String,

        /// Trailing rows to re-predict (0 for all).
        #[arg(long, default_value_t = DEFAULT_SCENARIO_ROWS)]
        rows: usize,
    },
}

/// Flags that override the `[training]` section.
#[derive(Args, Default)]
struct TrainingOverrides {
    /// Forecast horizons in days, comma-separated.
    #[arg(long, value_delimiter = ',')]
    horizons: Option<Vec<u32>>,

    /// Models to evaluate, comma-separated.
    #[arg(long, value_delimiter = ',')]
    models: Option<Vec<ModelKind>>,

    /// Minimum rows in the first training window.
    #[arg(long)]
    min_train_days: Option<usize>,

    /// Rows added to the training window per fold.
    #[arg(long)]
    step: Option<usize>,

    /// Trailing rows predicted by the refit model (0 for all).
    #[arg(long)]
    forecast_rows: Option<usize>,
}

impl TrainingOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        let training = &mut config.training;
        if let Some(horizons) = self.horizons {
            training.horizons = horizons;
        }
        if let Some(models) = self.models {
            training.models = models;
        }
        if let Some(min_train_days) = self.min_train_days {
            training.min_train_days = min_train_days;
        }
        if let Some(step) = self.step {
            training.step = step;
        }
        if let Some(forecast_rows) = self.forecast_rows {
            training.forecast_rows = forecast_rows;
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::FetchEia {
            route,
            series,
            column,
            start,
            end,
            out,
        } => run_fetch(route, series, column, &start, end.as_deref(), out),
        Commands::FetchAgsi {
            country,
            from,
            to,
            fallback,
            out,
        } => run_fetch_agsi(country, &from, to.as_deref(), fallback.as_deref(), &out),
        Commands::MergeAis {
            inputs,
            time_col,
            event_col,
            out,
        } => {
            let options = AisOptions {
                time_column: time_col,
                event_column: event_col,
            };
            let daily = aggregate_ais(&inputs, &options)?;
            write_series_csv(&daily, &out)?;
            println!("Wrote {} days of AIS counts to {}", daily.len(), out.display());
            Ok(())
        }
        Commands::BuildFeatures { overrides } => {
            let config = load_config(&cli.config, overrides)?;
            let table = forecastlab_runner::build_features(&config)?;
            println!(
                "Feature table: {} ({} rows, {} features)",
                config.output.features_file.display(),
                table.height(),
                table.feature_names().len()
            );
            Ok(())
        }
        Commands::Train { overrides } => {
            let config = load_config(&cli.config, overrides)?;
            let table = forecastlab_runner::load_features(&config)?;
            let summary = forecastlab_runner::train(&config, &table)?;
            print_summary(&summary, &config);
            Ok(())
        }
        Commands::Run { overrides } => {
            let config = load_config(&cli.config, overrides)?;
            let summary = forecastlab_runner::run(&config)?;
            print_summary(&summary, &config);
            Ok(())
        }
        Commands::Scenario {
            model,
            horizon,
            shocks,
            rows,
        } => {
            let config = load_config(&cli.config, TrainingOverrides::default())?;
            let shocks = ShockSet::parse(&shocks)?;
            let path = forecastlab_runner::scenario(&config, model, horizon, &shocks, rows)?;
            println!("Scenario written to: {}", path.display());
            Ok(())
        }
    }
}

fn load_config(path: &Path, overrides: TrainingOverrides) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::from_file(path)?;
    overrides.apply(&mut config);
    config.validate()?;
    let hash = config.config_hash()?;
    debug!(path = %path.display(), %hash, "loaded config");
    Ok(config)
}

fn run_fetch(
    route: String,
    series: String,
    column: String,
    start: &str,
    end: Option<&str>,
    out: PathBuf,
) -> Result<()> {
    let start = parse_day(start)?;
    let mut query = EiaQuery::daily(route, series, start);
    query.end = end.map(parse_day).transpose()?;

    let client = EiaClient::from_env()?;
    let fetched = client.fetch(&query, &column)?;
    write_series_csv(&fetched, &out)?;
    println!(
        "Wrote {} rows of '{}' to {}",
        fetched.len(),
        column,
        out.display()
    );
    Ok(())
}

fn run_fetch_agsi(
    country: String,
    from: &str,
    to: Option<&str>,
    fallback: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let from = parse_day(from)?;
    let to = match to {
        Some(to) => parse_day(to)?,
        None => chrono::Local::now().date_naive(),
    };

    let storage = match (AgsiClient::from_env(), fallback) {
        (Ok(client), _) => client.fetch(&AgsiQuery::new(country, from, to), "eu")?,
        (Err(DataError::AuthenticationRequired(reason)), Some(fallback)) => {
            warn!(%reason, fallback = %fallback.display(), "no AGSI key, using fallback file");
            read_series_csv(fallback, "eu")?
        }
        (Err(e), _) => return Err(e.into()),
    };
    write_series_csv(&storage, out)?;
    println!("Wrote {} rows of 'level_pct' to {}", storage.len(), out.display());
    Ok(())
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn print_summary(summary: &RunSummary, config: &PipelineConfig) {
    println!();
    println!("=== Walk-forward Summary ===");
    println!("Anchor:        {}", summary.anchor);
    println!("Seed:          {}", summary.seed);
    println!("Dataset hash:  {}", summary.dataset_hash);
    println!();
    println!(
        "{:<8} {:<6} {:>8} {:>6} {:>10} {:>10} {:>9}",
        "Horizon", "Model", "Rows", "Folds", "MAE", "RMSE", "MAPE"
    );
    println!("{}", "-".repeat(63));
    for run in &summary.runs {
        let mape = run
            .metrics
            .mape
            .map(|m| format!("{m:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:<8} {:<6} {:>8} {:>6} {:>10.4} {:>10.4} {:>9}",
            run.horizon,
            run.model.id(),
            run.trainable_rows,
            run.folds,
            run.metrics.mae,
            run.metrics.rmse,
            mape
        );
    }
    println!();
    println!("Artifacts saved to: {}", config.output.dir.display());
}
