//! API routes for the docflow server

pub mod documents;
pub mod queue;
pub mod stream;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload admission - with a larger body limit for multipart uploads
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Document management
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        // Live progress stream (SSE)
        .route("/documents/stream/:id", get(stream::stream_progress))
        // Queue administration
        .route("/queue", get(queue::list_queue))
        .route("/queue/stats", get(queue::queue_stats))
        .route("/queue/clear", post(queue::clear_queue))
        .route("/queue/:queue_id", delete(queue::remove_queue_item))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "docflow",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document ingestion backend with a sequential upload queue",
        "endpoints": {
            "POST /api/documents/upload": "Upload a document for processing",
            "GET /api/documents": "List processed documents",
            "GET /api/documents/:id": "Get document details",
            "DELETE /api/documents/:id": "Delete a document (soft by default)",
            "GET /api/documents/stream/:id": "Live processing progress (SSE)",
            "GET /api/queue": "List the upload queue",
            "GET /api/queue/stats": "Queue and processing statistics",
            "POST /api/queue/clear": "Clear the upload queue",
            "DELETE /api/queue/:queue_id": "Remove one queued item"
        }
    }))
}
