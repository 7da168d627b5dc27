//! Status HTTP server
//!
//! Axum server exposing read-only status, health and metrics endpoints
//! next to the bot. Stops when its cancellation token fires.

/// Endpoint handlers
pub mod api;

use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(api::info_handler))
        .route("/status", get(api::status_handler))
        .route("/health", get(api::health_handler))
        .route("/metrics", get(api::metrics_handler))
        .route("/api/info", get(api::info_handler))
        .route("/api/stats/summary", get(api::summary_handler))
        .route("/webhook", post(api::webhook_handler))
        .route("/favicon.ico", get(api::favicon_handler))
        .fallback(api::not_found_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status server bound to all interfaces
pub struct StatusServer {
    state: Arc<AppState>,
    addr: SocketAddr,
}

impl StatusServer {
    /// Create a server on `0.0.0.0:{webhook_port}`
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.webhook_port));
        Self { state, addr }
    }

    /// Address the server binds to
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound or serving fails.
    pub async fn run(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let router = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Status server listening on {}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Status server shut down gracefully");
        Ok(())
    }

    /// Run in a background task, logging bind and serve failures as soon
    /// as they happen.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let addr = self.addr;
        tokio::spawn(async move {
            if let Err(e) = self.run(shutdown).await {
                error!("Status server on {addr} stopped: {e}");
            }
        })
    }
}
