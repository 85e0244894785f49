//! Hunt API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ catch panic ─▶ metrics
//!                         ─▶ body limit ─▶ timeout
//!                         ─▶ rate limit (ClientRegistry, 429)
//!                         ─▶ authenticate (IdentityResolver, 401)
//!                         ─▶ permission gate (Requirement, 401/403)
//!                         ─▶ handler ─▶ versioned write (409 on conflict)
//!
//!     Background: eviction sweep, stopped by the shutdown broadcast
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use hunt_api::config::{load_config, ApiConfig};
use hunt_api::lifecycle::{signals, Shutdown};
use hunt_api::observability::{logging, metrics};
use hunt_api::HttpServer;

#[derive(Parser)]
#[command(name = "hunt-api")]
#[command(about = "Companies and users API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Built-in defaults when absent.
    #[arg(short, long, env = "HUNT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ApiConfig::default(),
    };

    logging::init_logging(&config.observability, config.environment);

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ApiConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "hunt-api starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    HttpServer::new(config).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
