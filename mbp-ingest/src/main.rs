//! mbp-ingest - Batch material ingestion service
//!
//! Accepts link lists and local file selections, resolves previews and
//! titles, and submits each item to the materials creation endpoint.
//! Integrates with the host UI via HTTP REST + SSE.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mbp_common::config::{load_toml_config, resolve_config_path, LoggingConfig, TomlConfig};
use mbp_common::events::EventBus;
use mbp_ingest::config::{
    resolve_creation_token, resolve_creation_url, resolve_drive_api_key, IngestLimits,
};
use mbp_ingest::services::{BatchParser, HttpCreationClient, MetadataResolver, ResolverConfig, UploadExecutor};
use mbp_ingest::workflow::Pipeline;
use mbp_ingest::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_ENV: &str = "MBP_CONFIG";
const DEFAULT_LOG_FILTER: &str = "mbp_ingest=info,tower_http=info";
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for mbp-ingest
#[derive(Parser, Debug)]
#[command(name = "mbp-ingest")]
#[command(about = "Batch material ingestion service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MBP_PORT")]
    port: Option<u16>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the materials creation endpoint
    #[arg(long)]
    creation_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging starts so the log level can come from it
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV);
    let (toml_config, config_error) = match config_path.as_deref() {
        Some(path) => match load_toml_config(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(format!("{}: {}", path.display(), e))),
        },
        None => (TomlConfig::default(), None),
    };

    init_logging(&toml_config.logging)?;

    info!("Starting mbp-ingest (Batch Material Ingestion)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match (&config_path, &config_error) {
        (_, Some(e)) => warn!("Could not load config {}. Using defaults.", e),
        (Some(path), None) => info!("Config: {}", path.display()),
        (None, None) => info!("No config file found, using built-in defaults"),
    }

    let creation_url = resolve_creation_url(args.creation_url.as_deref(), &toml_config)
        .context("Creation endpoint is required")?;
    let creation_client = HttpCreationClient::new(
        &creation_url,
        resolve_creation_token(&toml_config),
        toml_config.creation.timeout_secs.map(Duration::from_secs),
    )
    .context("Failed to initialize creation client")?;
    info!("Creation endpoint: {}", creation_client.endpoint());

    let drive_api_key = resolve_drive_api_key(&toml_config);
    if drive_api_key.is_none() {
        warn!("No Drive API key configured; cloud titles and folder previews are disabled");
    }
    let resolver = MetadataResolver::new(ResolverConfig::from_settings(
        &toml_config.resolver,
        drive_api_key,
    ))
    .context("Failed to initialize metadata resolver")?;

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let pipeline = Pipeline::new(
        BatchParser::new(IngestLimits::from_settings(&toml_config.limits)),
        Arc::new(resolver),
        Arc::new(UploadExecutor::new(Arc::new(creation_client))),
        event_bus,
    );

    let app = mbp_ingest::build_router(AppState::new(pipeline));

    let port = args.port.unwrap_or(toml_config.port);
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

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing
///
/// Filter priority: `RUST_LOG` → `[logging].level` → built-in default.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, stderr_layer) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
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
            Ok(mut stream) => {
                stream.recv().await;
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
