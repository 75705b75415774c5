//! guidebook-server - Backend HTTP API for guidebook
//!
//! Serves the country index, markdown content and PDFs from a blob store,
//! with bearer-authenticated admin writes and an SSE change feed.

pub mod auth;
pub mod config;
pub mod error;
pub mod index;
pub mod router;
pub mod routes;
pub mod sse;
pub mod state;
pub mod storage;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the server over a filesystem blob store until Ctrl+C / SIGTERM
pub async fn run(config: ServerConfig) -> Result<()> {
    let store = FsBlobStore::open(&config.data_dir)
        .await
        .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
    info!(data_dir = %config.data_dir.display(), "Blob store ready");

    let state = AppState::new(Arc::new(store), &config);
    let router = create_router(state);

    let addr = SocketAddr::new(config.bind, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server listening on http://{}", addr);
    println!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
