//! Error types shared across the crate

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by docflow components
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Queue item not found: {0}")]
    QueueItemNotFound(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Document content failed a pipeline check; the message is stored and
    /// broadcast as-is
    #[error("{0}")]
    Validation(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::DocumentNotFound(_) | Error::QueueItemNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
