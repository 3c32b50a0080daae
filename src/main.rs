//! Process entry point for the shelf upload service.
//!
//! Resolves configuration from the environment, clears stale staging files left by a
//! previous run, then serves the REST API until interrupted.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use shelf_core::config::{dir_from_env_value, max_upload_bytes_from_env_value};
use shelf_core::{
    CoreConfig, DEFAULT_ADDR, DEFAULT_STAGING_DIR, DEFAULT_STATIC_DIR, DEFAULT_UPLOAD_DIR,
};

/// Command-line arguments for `shelf-run`.
#[derive(Parser, Debug)]
#[command(name = "shelf-run", version, about = "LAN file upload service")]
struct Args {
    /// Host name or address shown in the startup banner
    #[arg(default_value = "localhost")]
    public_host: String,
}

/// Main entry point for the shelf service
///
/// # Environment Variables
/// - `SHELF_ADDR`: Listen address (default: "0.0.0.0:8080")
/// - `SHELF_UPLOAD_DIR`: Upload root (default: "uploads")
/// - `SHELF_STAGING_DIR`: Staging directory, must not overlap the upload root
///   (default: ".shelf-staging")
/// - `SHELF_STATIC_DIR`: Directory holding `index.html` and UI assets (default: ".")
/// - `SHELF_MAX_UPLOAD_BYTES`: Per-upload size limit (default: 10 GiB)
///
/// # Returns
/// * `Ok(())` - If the server runs and shuts down cleanly
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration values are invalid or the directories cannot be prepared,
/// - the listen address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelf=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let addr = std::env::var("SHELF_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.into());
    let max_upload_bytes =
        max_upload_bytes_from_env_value(std::env::var("SHELF_MAX_UPLOAD_BYTES").ok())?;
    let cfg = Arc::new(CoreConfig::new(
        dir_from_env_value(std::env::var("SHELF_UPLOAD_DIR").ok(), DEFAULT_UPLOAD_DIR),
        dir_from_env_value(std::env::var("SHELF_STAGING_DIR").ok(), DEFAULT_STAGING_DIR),
        dir_from_env_value(std::env::var("SHELF_STATIC_DIR").ok(), DEFAULT_STATIC_DIR),
        max_upload_bytes,
    )?);

    let state = AppState::new(cfg.clone());
    state.uploads.reap()?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();

    tracing::info!("++ Starting shelf on {}", addr);
    tracing::info!("++ Upload directory: {}", cfg.upload_dir().display());
    tracing::info!("++ Staging directory: {}", cfg.staging_dir().display());
    tracing::info!(
        "++ Serving UI from {}",
        display_dir(cfg.static_dir().to_path_buf()).display()
    );
    tracing::info!("++ Open http://{}:{}/", args.public_host, port);

    axum::serve(listener, api_rest::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- shelf stopped");
    Ok(())
}

fn display_dir(dir: PathBuf) -> PathBuf {
    dir.canonicalize().unwrap_or(dir)
}

/// Resolves on Ctrl-C, or on SIGTERM where supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Ctrl-C handler error: {:?}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM handler error: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("-- Shutdown signal received");
}
