pub mod blob;
pub mod cli;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod websocket;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blob::BlobSink;
use crate::config::Config;
use crate::registry::Registry;
use crate::websocket::websocket_handler;

/// Shared server state: one registry and one blob sink per server
/// instance, injected into the handlers via axum state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub blobs: Arc<BlobSink>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            blobs: Arc::new(BlobSink::new(&config.blob_path, config.blob_mode)),
        }
    }
}

/// Build the axum router. Clients upgrade at `/` (the reference endpoint)
/// or `/ws`; `/health` answers liveness probes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
