//! zousho-bi - Book Ingest service
//!
//! Looks up scanned ISBNs against openBD, Rakuten Books and Google Books
//! under per-provider rate limits, and groups series search results into
//! ordered volume runs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zousho_common::config::{self, LoggingConfig};
use zousho_common::events::EventBus;

use zousho_bi::config::resolve_sources;
use zousho_bi::services::BookLookupService;
use zousho_bi::AppState;

/// Command-line arguments for zousho-bi
#[derive(Parser, Debug)]
#[command(name = "zousho-bi")]
#[command(about = "Book ingest service for zousho")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ZOUSHO_BI_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config comes first so the log level can come from it
    let config_path = config::resolve_config_path(args.config.as_deref());
    let (toml_config, load_error) = match &config_path {
        Some(path) => match config::load_toml_config(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Default::default(), Some(e)),
        },
        None => (Default::default(), None),
    };

    init_tracing(&toml_config.logging)?;

    info!("Starting zousho-bi (Book Ingest) v{}", env!("CARGO_PKG_VERSION"));
    match (&config_path, load_error) {
        (Some(path), None) => info!("Config: {}", path.display()),
        (Some(path), Some(e)) => warn!("Failed to load {}: {}. Using defaults.", path.display(), e),
        (None, _) => info!("No config file found, using defaults"),
    }

    let event_bus = EventBus::new(256);
    let sources = resolve_sources(&toml_config);
    let lookups = Arc::new(
        BookLookupService::from_settings(&sources, event_bus.clone())
            .context("Failed to build provider clients")?,
    );
    let tickers = lookups.start();

    let state = AppState::new(lookups.clone(), event_bus);
    let app = zousho_bi::build_router(state);

    let port = args.port.unwrap_or_else(|| toml_config.port());
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    lookups.shutdown();
    for ticker in tickers {
        if let Err(e) = ticker.await {
            warn!("Ticker task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
