use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raspberry::config::Config;
use raspberry::server::MovieServer;
use raspberry::service::MovieService;

#[derive(Parser)]
#[command(
    name = "raspberry",
    version,
    about = "Worst-picture award catalog with redundant persistence",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the stores and serve the HTTP API
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the producer interval report as JSON
    Intervals,

    /// Overwrite the identifier counter
    ResetCounter {
        /// New last-issued identifier
        value: i64,
    },

    /// Rewrite the mirror file from the relational store
    RebuildMirror,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("Raspberry catalog starting");

    let service = MovieService::from_config(&config)?;
    let report = service
        .initialize(config.bootstrap.retry_config())
        .await
        .context("Startup reconciliation failed")?;
    tracing::debug!(?report, "Stores reconciled");

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, service).await?;
        }

        Commands::Intervals => {
            let report = service.get_intervals()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::ResetCounter { value } => {
            service.reset_counter(value)?;
            println!("Counter reset to {value}");
        }

        Commands::RebuildMirror => {
            let written = service.rebuild_mirror()?;
            println!(
                "Mirror rebuilt with {written} records: {}",
                service.mirror().path().display()
            );
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("raspberry=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("raspberry={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn serve(config: Config, service: MovieService) -> Result<()> {
    let server = MovieServer::new(config.server.clone(), Arc::new(service));

    server
        .start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
