//! Generation job server.
//!
//! Loads the configuration, wires the configured pipelines into the job
//! service and serves the HTTP/SSE API.

use std::path::PathBuf;

use actors::JobService;
use api::{AppState, build_router};
use clap::Parser;
use storage::ArtifactStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::ForgeConfig;

/// Command-line arguments for the job server.
#[derive(Parser, Debug)]
#[command(name = "forge-server")]
#[command(about = "Runs generation pipelines and serves their results")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long, env = "FORGE_BIND")]
    bind: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("Starting forge-server v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ForgeConfig::load(path)?
        }
        None => ForgeConfig::default(),
    };

    let artifacts = ArtifactStore::new(config.storage()?)?;
    info!("Artifact storage: {:?}", artifacts);

    let pipelines = config.pipelines()?;
    if pipelines.kinds().is_empty() {
        tracing::warn!("No pipelines configured; every job will fail");
    }
    for kind in pipelines.kinds() {
        info!("Registered pipeline for {} jobs", kind);
    }

    let (jobs, _store) = JobService::start(pipelines, artifacts.clone(), config.service()).await?;
    let app = build_router(AppState::new(jobs.clone(), artifacts));

    let bind = args.bind.unwrap_or(config.bind);
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind, e);
            return Err(e.into());
        }
    };
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    if let Err(e) = jobs.shutdown() {
        error!("Failed to stop job store: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
