//! CLI entry point for `mailocr`.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use mailocr::config::{self, Config};
use mailocr::error::IngestError;
use mailocr::event::{NotificationEvent, StorageEvent};
use mailocr::ocr::SpoolOcrService;
use mailocr::pipeline::{AggregateStage, ExtractStage, PageLimits, StageResponse, SubmitStage};
use mailocr::store::FsObjectStore;

#[derive(Parser)]
#[command(
    name = "mailocr",
    version,
    about = "Extract email attachments and run them through OCR"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $MAILOCR_CONFIG or the user config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the attachments of the emails named in a storage event
    Extract {
        /// Event JSON file (reads stdin when omitted)
        event: Option<PathBuf>,
    },
    /// Submit the documents named in a storage event as OCR jobs
    Submit {
        /// Event JSON file (reads stdin when omitted)
        event: Option<PathBuf>,
    },
    /// Collect the results of the jobs named in a completion notification
    Aggregate {
        /// Event JSON file (reads stdin when omitted)
        event: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => config::load_config(),
    };
    config.apply_env_overrides();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let response = match run(&cli.command, &config) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Stage failed");
            println!("{}", serde_json::to_string_pretty(&StageResponse::failure(&e))?);
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run(command: &Commands, config: &Config) -> Result<StageResponse, IngestError> {
    let store = FsObjectStore::new(&config.storage.root);

    match command {
        Commands::Extract { event } => {
            config.validate_for_extract()?;
            let event: StorageEvent = read_event(event.as_deref())?;
            ExtractStage::from_config(&store, &config.storage).handle(&event)
        }
        Commands::Submit { event } => {
            config.validate_for_submit()?;
            let event: StorageEvent = read_event(event.as_deref())?;
            let ocr = spool_service(config, &store);
            SubmitStage::from_config(&ocr, &config.ocr).handle(&event)
        }
        Commands::Aggregate { event } => {
            let event: NotificationEvent = read_event(event.as_deref())?;
            let ocr = spool_service(config, &store);
            AggregateStage::new(&ocr, PageLimits::from(&config.aggregate)).handle(&event)
        }
    }
}

fn spool_service<'a>(config: &Config, store: &'a FsObjectStore) -> SpoolOcrService<&'a FsObjectStore> {
    SpoolOcrService::new(config.ocr.spool_dir_or(&config.storage.root), store)
}

/// Read an event batch from a file, or from stdin when no path is given.
fn read_event<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, IngestError> {
    let raw = match path {
        Some(path) => std::fs::read(path).map_err(|e| IngestError::io(path, e))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| IngestError::io("<stdin>", e))?;
            buf
        }
    };
    serde_json::from_slice(&raw).map_err(|e| IngestError::InvalidEvent(e.to_string()))
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailocr.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
