//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_message, handle_online, handle_proxy, handle_stats};
use axum::{
    routing::{get, post},
    Router,
};
use gamecache::{Fetcher, OfflineWorker};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// The worker every proxied request is offered to first
    pub worker: Arc<OfflineWorker>,
    /// Fetcher for requests the worker leaves alone
    pub upstream: Arc<dyn Fetcher>,
}

/// Build the router: control endpoints under `/__gamecache/`, everything
/// else proxied through the worker.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/__gamecache/health", get(handle_health))
        .route("/__gamecache/stats", get(handle_stats))
        .route("/__gamecache/message", post(handle_message))
        .route("/__gamecache/online", post(handle_online))
        .fallback(handle_proxy)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    worker: Arc<OfflineWorker>,
    upstream: Arc<dyn Fetcher>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(Arc::new(AppState { worker, upstream }));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
