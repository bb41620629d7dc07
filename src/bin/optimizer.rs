//! optimizer: autopost cost optimizer CLI
//!
//! Inspect fingerprints, check shared-tier health and run image cleanups
//! against a deployment's configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autopost_optimizer::{
    CleanupScheduler, Config, CostOptimizer, HealthReport, OptimizerError, derive_fingerprint,
};

/// Autopost cost optimizer CLI
#[derive(Parser)]
#[command(name = "optimizer")]
#[command(version = autopost_optimizer::PKG_VERSION)]
#[command(about = "Autopost analysis cache and cleanup tool")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "AUTOPOST_OPTIMIZER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cache fingerprint of one or more image files (in order)
    Fingerprint {
        /// Image files, in upload order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ping the shared tier and print the health report as JSON
    Health,

    /// Delete uploaded images after a delay
    Cleanup {
        /// Resource ids to delete
        #[arg(required = true)]
        ids: Vec<String>,
        /// Minutes to wait before deleting (default: configured delay)
        #[arg(short, long)]
        delay_minutes: Option<u64>,
    },

    /// Load, validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Fingerprint { files } => {
            let mut buffers = Vec::with_capacity(files.len());
            for file in &files {
                buffers.push(std::fs::read(file).map_err(|e| {
                    OptimizerError::InvalidInput(format!("failed to read {}: {e}", file.display()))
                })?);
            }
            let fingerprint = derive_fingerprint(&buffers);
            println!("{fingerprint}");
            println!("short: {}", fingerprint.short());
        }

        Command::Health => {
            let config = load_config(args.config.as_deref())?;
            let optimizer = CostOptimizer::from_config(&config).await?;
            let cleanup = CleanupScheduler::from_config(&config.cleanup)?;
            let report = HealthReport::collect(&optimizer, Some(&cleanup)).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Cleanup { ids, delay_minutes } => {
            let config = load_config(args.config.as_deref())?;
            let scheduler = CleanupScheduler::from_config(&config.cleanup)?;
            let delay = delay_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(scheduler.config().default_delay);

            match scheduler.schedule_cleanup(ids, delay) {
                Some(handle) => {
                    let report = handle.await?;
                    println!("deleted: {}, failed: {}", report.deleted, report.failed);
                }
                None => println!("cleanup disabled, nothing scheduled"),
            }
        }

        Command::CheckConfig => {
            let config = load_config(args.config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Load configuration, falling back to defaults when no file exists and none
/// was requested explicitly, then apply environment overrides.
fn load_config(explicit: Option<&std::path::Path>) -> Result<Config, OptimizerError> {
    let mut config = match Config::load(explicit) {
        Ok(config) => config,
        Err(e) if explicit.is_none() => {
            warn!(error = %e, "no config file, using defaults");
            Config::default()
        }
        Err(e) => return Err(e),
    };
    config.apply_env_overrides();
    config.validate()?;
    info!(
        backend = config.shared.backend.as_str(),
        caching = config.cache.enabled,
        cleanup = config.cleanup.enabled,
        "configuration loaded"
    );
    Ok(config)
}
