//! blightcheck server
//!
//! Potato leaf disease detection over HTTP.
//!
//! Loads one pretrained CNN at startup and serves:
//! - `GET /ping`: liveness
//! - `POST /predict`: multipart image upload, answers with the predicted
//!   class (Early Blight, Late Blight, Healthy) and its confidence

use anyhow::{Context, Result};
use blightcheck_classifiers::{DeviceType, ModelHost};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod routes;
mod state;

use config::ServerConfig;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "blightcheck")]
#[command(about = "Plant disease classification server", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "blightcheck.yaml")]
    config: String,

    /// Listen host
    #[arg(short = 'l', long, env = "BLIGHTCHECK_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "BLIGHTCHECK_PORT")]
    port: Option<u16>,

    /// Model weights file (.safetensors, .pt, .pth, .bin)
    #[arg(short, long, env = "BLIGHTCHECK_MODEL")]
    model: Option<PathBuf>,

    /// Inference device: cpu, cuda:N or metal:N
    #[arg(short, long, env = "BLIGHTCHECK_DEVICE")]
    device: Option<DeviceType>,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "BLIGHTCHECK_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting blightcheck");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model: {}", config.model.path.display());
    info!("Device: {}", config.model.device);
    info!("Upload limit: {} bytes", config.max_upload_bytes);

    // The model is a startup precondition: no model, no server
    let host = ModelHost::load(&config.model).context("Failed to load model")?;
    host.verify()
        .await
        .context("Model failed its startup check")?;

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let app = routes::create_router(AppState::new(config, host));

    // Graceful shutdown handler
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("blightcheck=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blightcheck=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
