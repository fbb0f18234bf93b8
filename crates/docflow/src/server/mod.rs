//! HTTP server for the docflow backend

pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::DocflowConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Docflow HTTP server
pub struct DocflowServer {
    config: DocflowConfig,
    state: AppState,
}

impl DocflowServer {
    /// Create a new server
    pub fn new(config: DocflowConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Build the router with all routes
    fn build_router(&self) -> Router {
        let router = Router::new()
            // Health check
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            // API routes with body limit for multipart uploads
            .nest("/api", routes::api_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            // Middleware layers (order matters - applied bottom to top)
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Run startup recovery, start the queue processor, and serve until
    /// Ctrl+C is received.
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        // Recovery must complete before the processor takes its first item
        self.state.start_processing();

        let router = self.build_router();

        tracing::info!("Starting docflow server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        self.state.stop_processing().await;
        tracing::info!("Server stopped");

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }

    /// Shared application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Resolves when Ctrl+C is received
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.db().health_check().unwrap_or(false);
    let vector_index = state.vector_index().health_check().await.unwrap_or(false);
    let ready = database && vector_index;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "checks": {
                "database": database,
                "vector_index": vector_index,
            },
        })),
    )
}
