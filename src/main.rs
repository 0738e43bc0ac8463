//! bootgate
//!
//! Dependency-gated bootstrap for a database-backed service.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML + DATABASE_URL)
//!        │ validate (fail fast, exit 78)
//!        ▼
//!   ┌──────────────┐  healthy   ┌──────────────┐  up to date  ┌──────────────┐
//!   │  dependency  │──────────▶ │  migration   │────────────▶ │    server    │
//!   │    prober    │            │    runner    │              │   launcher   │
//!   └──────┬───────┘            └──────┬───────┘              └──────┬───────┘
//!          │ deadline (exit 69)        │ step failed (exit 65)       │ bind failed (exit 71)
//!          ▼                           ▼                             ▼
//!                          Failed(stage, reason)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use bootgate::config::{load_config, BootConfig, ConfigError, ObservabilityConfig, ValidationError};
use bootgate::dependency::{self, DependencyProber, SchemaStore};
use bootgate::error::BootError;
use bootgate::lifecycle::{signals, BootSequencer, Shutdown};
use bootgate::migration::{MigrationCatalog, MigrationError, MigrationFailure, SchemaVersion};
use bootgate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "bootgate")]
#[command(about = "Wait for the database, migrate it, then serve", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the full boot sequence and serve until shutdown (default)
    Serve,
    /// Wait for the database and apply migrations, then exit
    Migrate,
    /// Report the recorded schema version against the target
    Status,
    /// Validate configuration and print it with credentials redacted
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init_logging(&ObservabilityConfig::default());
            let err = BootError::from(e);
            tracing::error!(error = %err, "Refusing to start");
            return ExitCode::from(err.exit_code());
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bootgate starting");

    match run(cli.command.unwrap_or(Command::Serve), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(e.exit_code()),
    }
}

async fn run(command: Command, config: BootConfig) -> Result<(), BootError> {
    if let Command::CheckConfig = command {
        let mut redacted = config.clone();
        redacted.database.url = config.database.redacted_url();
        match serde_json::to_string_pretty(&redacted) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "Failed to render configuration"),
        }
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let store = dependency::open_store(&config.database, config.probe.attempt_timeout())
        .map_err(|e| {
            tracing::error!(error = %e, "Invalid dependency descriptor");
            BootError::Config(ConfigError::Validation(vec![
                ValidationError::InvalidDatabaseUrl(e.to_string()),
            ]))
        })?;

    match command {
        Command::Serve => BootSequencer::new(config, store, shutdown).run().await,
        Command::Migrate => BootSequencer::new(config, store, shutdown)
            .prepare()
            .await
            .map(|_| ()),
        Command::Status => status(&config, store, shutdown).await,
        Command::CheckConfig => Ok(()),
    }
}

async fn status(
    config: &BootConfig,
    store: Arc<dyn SchemaStore>,
    shutdown: Shutdown,
) -> Result<(), BootError> {
    let catalog = MigrationCatalog::embedded();
    let result: Result<SchemaVersion, BootError> = async {
        DependencyProber::new(store.as_ref(), &config.probe)
            .await_dependency(&mut shutdown.subscribe())
            .await
            .map_err(BootError::DependencyTimeout)?;

        let mut lock = store
            .lock(config.database.lock_key)
            .await
            .map_err(|e| migration_error(MigrationFailure::Lock(e)))?;
        let current = lock.current_version().await;
        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "Failed to release migration lock cleanly");
        }
        current.map_err(|e| migration_error(MigrationFailure::ReadVersion(e)))
    }
    .await;
    store.close().await;

    let current = result?;
    let target = catalog.resolve(config.migration.target).unwrap_or(catalog.head());
    let pending: Vec<_> = catalog
        .pending(current, target)
        .iter()
        .map(|s| json!({ "version": s.version, "name": s.name }))
        .collect();

    println!(
        "{}",
        json!({
            "current": current,
            "target": target,
            "head": catalog.head(),
            "pending": pending,
        })
    );
    Ok(())
}

fn migration_error(failure: MigrationFailure) -> BootError {
    BootError::Migration(MigrationError {
        failure,
        last_successful_version: None,
    })
}
