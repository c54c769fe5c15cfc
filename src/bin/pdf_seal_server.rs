//! PDF seal HTTP server
//!
//! Serves certificate issuance, signing and public validation over HTTP,
//! with a local-directory object store and an in-memory database.
//!
//! Usage:
//!   PDF_SEAL_MASTER_KEY=... cargo run --release --bin pdf_seal_server
//!
//! Environment: see `SealConfig::from_env`. `RUST_LOG` sets the log level.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};

use pdf_seal::api::{router, AppState};
use pdf_seal::config::SealConfig;
use pdf_seal::signing::DocumentLifecycle;
use pdf_seal::store::{LocalFsStorage, MemoryDatabase, ObjectStorage, TimeoutStorage};

/// Interval of the stale-draft sweep.
const EXPIRY_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SealConfig::from_env()?;
    if config.master_key().is_err() {
        warn!("PDF_SEAL_MASTER_KEY is not set: certificate issuance and PKI signing will fail");
    }
    info!("configuration: {:?}", config);

    let local = LocalFsStorage::new(&config.storage_dir, &config.base_url);
    local.init().await?;
    let storage: Arc<dyn ObjectStorage> =
        Arc::new(TimeoutStorage::new(Arc::new(local), config.storage_timeout));
    let database = Arc::new(MemoryDatabase::new());

    let bind_addr = config.bind_addr;
    let lifecycle =
        DocumentLifecycle::new(Arc::new(config.clone()), storage.clone(), database.clone());
    let state = AppState::with_database(config, storage, database);
    let app = router(state);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXPIRY_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = lifecycle.expire_stale_drafts(Utc::now()).await {
                error!("draft expiry sweep failed: {}", e);
            }
        }
    });

    info!("listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutdown signal received");
}
