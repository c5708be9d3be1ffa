//! model-sync: keep a model directory in step with a remote catalog.
//!
//! Examples:
//!   model-sync --settings updater.yaml sync
//!   model-sync --settings updater.yaml sync-one sdxl_base
//!   model-sync --settings updater.yaml watch --interval 300

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use model_sync::{
    logging, start_scheduled_updates, ConfigStore, ModelEvent, ModelEvents, Reconciler, Result,
    SyncSummary, UpdaterSettings,
};

#[derive(Parser)]
#[command(
    name = "model-sync",
    about = "Synchronize a local model directory with a remote catalog",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Updater settings file (YAML)
    #[arg(long, global = true, value_name = "PATH", default_value = "updater.yaml")]
    settings: PathBuf,

    /// log4rs configuration file (YAML); logs to stderr when omitted
    #[arg(long, global = true, value_name = "PATH")]
    log_config: Option<PathBuf>,

    /// Print pass summaries as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full synchronization pass
    Sync,
    /// Download and configure a single model by name
    SyncOne {
        /// Catalog name of the model
        name: String,
    },
    /// List catalog models with no local file, without downloading
    Missing,
    /// Synchronize periodically until interrupted
    Watch {
        /// Seconds between passes (defaults to update_interval_seconds)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.log_config.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = UpdaterSettings::load(&cli.settings)?;
    let store_path = settings.config_store_path();
    let store = ConfigStore::load(&store_path)?;
    let events = ModelEvents::default();
    let engine = Arc::new(Reconciler::from_settings(&settings, store, events)?);

    match cli.command {
        Commands::Sync => {
            let summary = engine.synchronize_all().await?;
            print_summary(&summary, cli.json);
            persist_if_merged(&engine, &summary, &store_path).await?;
        }
        Commands::SyncOne { name } => {
            let summary = engine.synchronize_one(&name).await?;
            print_summary(&summary, cli.json);
            persist_if_merged(&engine, &summary, &store_path).await?;
        }
        Commands::Missing => {
            let missing = engine.missing_artifacts().await?;
            if missing.is_empty() {
                println!("No model updates required.");
            }
            for descriptor in missing {
                println!(
                    "{}\t{}\t{:.1} MB\t{}",
                    descriptor.name,
                    descriptor.kind,
                    descriptor.size_bytes as f64 / (1024.0 * 1024.0),
                    descriptor.download_url
                );
            }
        }
        Commands::Watch { interval } => {
            let every = interval.unwrap_or(settings.update_interval_seconds);
            watch(engine, Duration::from_secs(every), store_path, cli.json).await?;
        }
    }
    Ok(())
}

async fn watch(
    engine: Arc<Reconciler>,
    every: Duration,
    store_path: PathBuf,
    json: bool,
) -> Result<()> {
    let token = CancellationToken::new();

    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received; stopping after the current pass."),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
        ctrl_c_token.cancel();
    });

    // Flush the configuration store after every pass that merged something
    let mut rx = engine.events().subscribe();
    let persist_engine = engine.clone();
    let persist_path = store_path.clone();
    let reporter = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ModelEvent::PassComplete(summary)) => {
                    print_summary(&summary, json);
                    if let Err(e) = persist_if_merged(&persist_engine, &summary, &persist_path).await {
                        error!("{}", e);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} model events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let handle = start_scheduled_updates(engine.clone(), every, token);
    handle.join().await;
    reporter.abort();

    engine.save_config(&store_path).await
}

async fn persist_if_merged(engine: &Reconciler, summary: &SyncSummary, path: &Path) -> Result<()> {
    if summary.merged > 0 {
        engine.save_config(path).await?;
        info!("Saved configuration store to {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &SyncSummary, json: bool) {
    if json {
        match serde_json::to_string(summary) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        println!("{}", summary);
    }
}
