//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with health handlers and application routes
//! - Bind the listener, then fire the readiness signal
//! - Serve until shutdown, clearing readiness as soon as it begins

use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::readiness::Readiness;
use crate::lifecycle::shutdown::ShutdownSignal;

/// Error type for server startup and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Starts the long-lived request-serving loop.
pub struct ServerLauncher {
    config: ServerConfig,
    readiness: Readiness,
    routes: Router,
}

impl ServerLauncher {
    pub fn new(config: ServerConfig, readiness: Readiness) -> Self {
        Self {
            config,
            readiness,
            routes: Router::new(),
        }
    }

    /// Merge application routes into the served router.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Build the full router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/health/live", get(live))
            .route("/health/ready", get(ready))
            .with_state(self.readiness.clone())
            .merge(self.routes.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured listener without marking the instance ready.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.config.bind_address.clone()))?;

        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind, then serve until shutdown.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        let app = self.router();

        tracing::info!(address = %addr, "HTTP server starting");
        self.readiness.mark_ready(addr);

        let readiness = self.readiness.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                readiness.mark_not_ready();
                tracing::info!("Draining connections");
            })
            .await;

        self.readiness.mark_not_ready();
        result.map_err(ServerError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn live() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

async fn ready(State(readiness): State<Readiness>) -> (StatusCode, Json<Value>) {
    if readiness.is_ready() {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready" })),
        )
    }
}
