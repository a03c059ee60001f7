//! # agora-server
//!
//! Real-time backend for the Agora social application.
//!
//! This binary provides:
//! - **WebSocket event surface** for post creation, post deletion, direct
//!   messages and like relays, with normalized broadcasts to every peer
//! - **Attachment storage** with per-record directories and JPEG metadata
//!   stripping before anything touches disk
//! - **SQLite persistence** (via `agora-store`) for users, posts,
//!   conversations and messages
//! - **REST API** (axum) for health checks, the feed, conversation lists
//!   and message history
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod config;
mod error;
mod hub;
mod media_store;
mod rate_limit;
mod router;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agora_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::hub::EventHub;
use crate::media_store::MediaStore;
use crate::rate_limit::RateLimiter;
use crate::router::EventRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agora_server=debug")),
        )
        .init();

    info!("Starting Agora server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Database (runs migrations on open)
    let db = Arc::new(Mutex::new(Database::open_at(&config.database_path)?));

    // Media store (creates directory if missing)
    let media = Arc::new(
        MediaStore::new(
            config.media_storage_path.clone(),
            config.public_domain.clone(),
        )
        .await?,
    );

    // Broadcast hub and rate limiter
    let hub = EventHub::default();
    let rate_limiter = RateLimiter::default();

    let config = Arc::new(config);
    let router = Arc::new(EventRouter::new(
        db.clone(),
        media.clone(),
        hub.clone(),
        config.clone(),
    ));

    let app_state = AppState {
        db,
        media,
        router,
        hub,
        rate_limiter: rate_limiter.clone(),
        config: config.clone(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.purge_stale(Duration::from_secs(600)).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
