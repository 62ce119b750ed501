//! ogsnap server entry point.
//!
//! Boots the snapshot service on HTTP. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use ogsnap_client::{CaptureConfig, DurableStore, HeadlessCapturer, Origin, S3Config};
use ogsnap_core::{AppConfig, ContentStore, EphemeralStore, StoreBackend};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::orchestrator::Orchestrator;

mod error;
mod flight;
mod handler;
mod orchestrator;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = Origin::parse(&config.origin)?;
    let (store, reaper) = open_store(&config).await?;

    if store.supports_delete() {
        if let Err(e) = config.require_auth_token() {
            tracing::warn!("{e}; every keyed DELETE will be rejected");
        }
    }

    let capturer = Arc::new(HeadlessCapturer::start(CaptureConfig::from(&config)).await?);
    let orchestrator = Orchestrator::new(origin, store, capturer.clone(), config.auth_token.clone());
    let app = handler::router(Arc::new(orchestrator));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, origin = %config.origin, "Starting ogsnap server");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Shutting down");
    capturer.stop().await;
    if let Some(reaper) = reaper {
        reaper.abort();
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<(Arc<dyn ContentStore>, Option<JoinHandle<()>>)> {
    match config.backend {
        StoreBackend::Durable => {
            let store = DurableStore::new(S3Config::from_app(config)?)?;
            tracing::info!(bucket = %store.config().bucket, "using durable store");
            let store: Arc<dyn ContentStore> = Arc::new(store);
            Ok((store, None))
        }
        StoreBackend::Ephemeral => {
            let store = Arc::new(EphemeralStore::open(config.cache_dir.clone(), config.cache_ttl()).await?);
            tracing::info!(dir = %store.dir().display(), ttl_ms = config.cache_ttl_ms, "using ephemeral store");
            let reaper = Arc::clone(&store).spawn_reaper(config.reap_interval());
            let store: Arc<dyn ContentStore> = store;
            Ok((store, Some(reaper)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
