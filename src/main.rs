use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::TurnstileConfig;
use turnstile::http::HttpServer;
use turnstile::ratelimit::{AdmissionGate, LimiterStore, Reclaimer};

/// Per-client admission control service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Turnstile admission control");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.config.as_deref() {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    if let Some(addr) = args.listen {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        max_requests = config.rate_limiting.max_requests,
        window_secs = config.rate_limiting.window_secs,
        "Configuration loaded"
    );

    let limiter_config = config.rate_limiting.limiter_config()?;
    let reclaimer_config = config.rate_limiting.reclaimer_config()?;
    let extractor = config.rate_limiting.client_key_extractor()?;

    let store = Arc::new(LimiterStore::new(limiter_config));
    let reclaimer = Reclaimer::new(Arc::clone(&store), reclaimer_config).spawn();

    let server = HttpServer::new(config.server.http_addr, AdmissionGate::new(store), extractor);

    // Run the server with graceful shutdown on Ctrl+C
    let served = server.serve_with_shutdown(shutdown_signal()).await;

    reclaimer.shutdown().await;
    served?;

    info!("Turnstile stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
