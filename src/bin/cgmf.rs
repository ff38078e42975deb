//! cgmf - command-line interface for CGM feature preparation
//!
//! Commands:
//! - import: Load the CSV exports into the SQLite store
//! - features: Print the prediction feature table ending at a timestamp
//! - estimate: Estimate post-meal glucose for a meal description
//! - stats: Daily and weekly glucose statistics
//! - insights: Recent logs around a date
//! - examples: Similar past meals with their glucose change
//! - chat: Append a chat turn and print the recent history

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, NaiveDate, Utc};
use cgm_features::flatfile::FlatFileSource;
use cgm_features::types::parse_timestamp;
use cgm_features::{
    Config, DataError, DataHandler, FeatureOutcome, FeatureTable, SqliteStore, UniformNoise,
    PRODUCER_NAME, VERSION,
};

/// cgmf - CGM data access and prediction features
#[derive(Parser)]
#[command(name = "cgmf")]
#[command(author = "Buhai Health")]
#[command(version = VERSION)]
#[command(about = "Prepare CGM prediction features and meal estimates", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path from the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load CSV exports into the database
    Import {
        /// Directory holding the exports (defaults to the configured data_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the feature table for the window ending at a timestamp
    Features {
        /// Window end (e.g. "2024-03-01 09:00:00" or RFC 3339)
        #[arg(short, long, value_parser = parse_end_time)]
        end: DateTime<Utc>,

        /// Lookback in minutes (defaults to the configured window)
        #[arg(short, long)]
        window: Option<u32>,

        /// Output format
        #[arg(long, default_value = "json")]
        format: TableFormat,
    },

    /// Estimate post-meal glucose for a meal description
    Estimate {
        /// Free-text meal description, e.g. "2 cups of rice"
        description: String,

        /// Seed the display noise for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Print the full derivation instead of the value only
        #[arg(long)]
        json: bool,
    },

    /// Daily and weekly glucose statistics
    Stats {
        /// Day to summarise (defaults to today, clamped to the latest data)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the stored aggregate rows instead of computing from readings
        #[arg(long)]
        aggregates: bool,
    },

    /// Recent meals, sleep and activity around a date
    Insights {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Similar past meals with their one-hour glucose change
    Examples {
        description: String,

        /// Maximum number of examples
        #[arg(short, default_value = "3")]
        n: usize,
    },

    /// Append a chat turn and print the recent history
    Chat {
        #[arg(long)]
        user: String,

        /// Who sent the message (e.g. "user", "assistant")
        #[arg(long, default_value = "user")]
        actor: String,

        message: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TableFormat {
    Json,
    Csv,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CgmfCliError> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Import { dir } => cmd_import(&config, dir),
        Commands::Features { end, window, format } => cmd_features(config, end, window, format),
        Commands::Estimate {
            description,
            seed,
            json,
        } => cmd_estimate(config, &description, seed, json),
        Commands::Stats { date, aggregates } => cmd_stats(config, date, aggregates),
        Commands::Insights { date } => cmd_insights(config, date),
        Commands::Examples { description, n } => cmd_examples(config, &description, n),
        Commands::Chat { user, actor, message } => cmd_chat(config, &user, &actor, &message),
    }
}

fn cmd_import(config: &Config, dir: Option<PathBuf>) -> Result<(), CgmfCliError> {
    let source = FlatFileSource::new(dir.unwrap_or_else(|| config.data_dir.clone()));
    let mut store = SqliteStore::open(&config.db_path)?;
    let report = store.import_flat_files(&source)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_features(
    config: Config,
    end: DateTime<Utc>,
    window: Option<u32>,
    format: TableFormat,
) -> Result<(), CgmfCliError> {
    let window = window.unwrap_or(config.window_minutes);
    let handler = open_handler(config)?;

    let table = match handler.prediction_features(end, window) {
        FeatureOutcome::Ready(table) => table,
        FeatureOutcome::NoData => FeatureTable::empty(end, window),
        FeatureOutcome::Unavailable(reason) => return Err(CgmfCliError::Unavailable(reason)),
    };

    match format {
        TableFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        TableFormat::Csv => print!("{}", table.to_csv()),
    }
    Ok(())
}

fn cmd_estimate(
    config: Config,
    description: &str,
    seed: Option<u64>,
    json: bool,
) -> Result<(), CgmfCliError> {
    // Estimation degrades to a fallback value instead of failing
    let handler = DataHandler::open(config);
    let mut handler = match seed {
        Some(seed) => handler.with_noise(UniformNoise::seeded(seed)),
        None => handler,
    };

    let estimate = handler.estimate_meal(description);
    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        println!("{:.1}", estimate.value);
    }
    Ok(())
}

fn cmd_stats(config: Config, date: Option<NaiveDate>, aggregates: bool) -> Result<(), CgmfCliError> {
    let handler = open_handler(config)?;
    let today = handler.effective_today(date.unwrap_or_else(|| Utc::now().date_naive()))?;

    if aggregates {
        let store = handler.store().ok_or_else(|| CgmfCliError::Unavailable("no database".into()))?;
        println!("{}", serde_json::to_string_pretty(&store.daily_summary(today)?)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&handler.glucose_summary(today)?)?);
    }
    Ok(())
}

fn cmd_insights(config: Config, date: Option<NaiveDate>) -> Result<(), CgmfCliError> {
    let handler = open_handler(config)?;
    let today = date.unwrap_or_else(|| Utc::now().date_naive());
    println!("{}", serde_json::to_string_pretty(&handler.insight_context(today)?)?);
    Ok(())
}

fn cmd_examples(config: Config, description: &str, n: usize) -> Result<(), CgmfCliError> {
    let handler = open_handler(config)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&handler.meal_examples(description, n)?)?
    );
    Ok(())
}

fn cmd_chat(config: Config, user: &str, actor: &str, message: &str) -> Result<(), CgmfCliError> {
    let mut handler = open_handler(config)?;
    handler.add_chat_turn(user, actor, message)?;
    println!("{}", serde_json::to_string_pretty(&handler.chat_history(user)?)?);
    Ok(())
}

/// Open the configured store, failing when it is unavailable
fn open_handler(config: Config) -> Result<DataHandler<SqliteStore>, CgmfCliError> {
    let store = SqliteStore::open(&config.db_path)
        .map_err(|e| CgmfCliError::Unavailable(e.to_string()))?;
    log::debug!("{PRODUCER_NAME} {VERSION} using {}", config.db_path.display());
    Ok(DataHandler::new(store, config))
}

fn parse_end_time(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

// Error handling

#[derive(Debug)]
enum CgmfCliError {
    Io(io::Error),
    Data(DataError),
    Json(serde_json::Error),
    Unavailable(String),
}

impl From<io::Error> for CgmfCliError {
    fn from(e: io::Error) -> Self {
        CgmfCliError::Io(e)
    }
}

impl From<DataError> for CgmfCliError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::StoreUnavailable(reason) => CgmfCliError::Unavailable(reason),
            other => CgmfCliError::Data(other),
        }
    }
}

impl From<serde_json::Error> for CgmfCliError {
    fn from(e: serde_json::Error) -> Self {
        CgmfCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CgmfCliError> for CliError {
    fn from(e: CgmfCliError) -> Self {
        match e {
            CgmfCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CgmfCliError::Data(e @ (DataError::FlatFile { .. } | DataError::MissingColumn { .. })) => CliError {
                code: "IMPORT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the CSV export headers and values".to_string()),
            },
            CgmfCliError::Data(e @ DataError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Fix the configuration file or pass --config".to_string()),
            },
            CgmfCliError::Data(e) => CliError {
                code: "DATA_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CgmfCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CgmfCliError::Unavailable(reason) => CliError {
                code: "STORE_UNAVAILABLE".to_string(),
                message: reason,
                hint: Some("Check db_path, or run 'cgmf import' first".to_string()),
            },
        }
    }
}
