//! veritas-ad - Authenticity Detection microservice
//!
//! Accepts audio and video uploads, runs the external CNN/RNN analysis
//! engine against each one and returns both classifiers' verdicts.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use veritas_ad::config::{CliOverrides, ServiceConfig, MODULE_NAME};
use veritas_ad::AppState;
use veritas_common::config::{default_config_path, RootFolderInitializer, TomlConfig};

/// Command-line arguments for veritas-ad
#[derive(Parser, Debug)]
#[command(name = "veritas-ad")]
#[command(about = "Media authenticity detection microservice")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "VERITAS_AD_PORT")]
    port: Option<u16>,

    /// Root folder for service data (overrides VERITAS_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "VERITAS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts because it carries the log level
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME));
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let toml = match &config_path {
        Some(path) => TomlConfig::load(path).context("Failed to load config file")?,
        None => TomlConfig::default(),
    };

    let config = ServiceConfig::resolve(
        toml,
        CliOverrides {
            root_folder: args.root_folder,
            port: args.port,
        },
    )
    .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting veritas-ad (Authenticity Detection) microservice");
    info!(
        "Version: {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match (&config_path, config_exists) {
        (Some(path), true) => info!("Config: {}", path.display()),
        (Some(path), false) => info!("Config: {} not found, using compiled defaults", path.display()),
        (None, _) => info!("Config: no config directory, using compiled defaults"),
    }

    RootFolderInitializer::new(config.root_folder.clone())
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", config.root_folder.display());
    info!("Scratch directory: {}", config.staging.root.display());
    info!(
        "Engines: audio={:?} video={:?} timeout={}s slots={}",
        config.engine.audio.program,
        config.engine.video.program,
        config.engine.timeout.as_secs(),
        config.max_concurrent_engines
    );

    let orchestrator = config.build_orchestrator();
    let state = AppState::new(orchestrator, config.max_upload_bytes);
    let pipeline = Arc::clone(&state.orchestrator);
    let app = veritas_ad::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Queued uploads fail now; analyses already running finish
            pipeline.close();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
