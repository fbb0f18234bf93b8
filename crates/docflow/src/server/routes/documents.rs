//! Document upload and management routes

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::DocumentQuery;
use crate::types::{extension_allowed, file_extension, DocumentMetadata, ALLOWED_EXTENSIONS};

/// Response for a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub status: String,
    pub queue_position: i64,
    pub message: String,
}

/// Query parameters for document listing
#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub category: Option<String>,
    pub uploader_id: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Response for document listing
#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentMetadata>,
    pub total: u64,
    pub limit: i64,
    pub offset: i64,
}

/// Query parameters for document deletion
#[derive(Debug, Deserialize)]
pub struct DeleteDocumentQuery {
    #[serde(default)]
    pub hard_delete: bool,
    #[serde(default = "default_deleted_by")]
    pub deleted_by: String,
}

fn default_deleted_by() -> String {
    "admin".to_string()
}

/// Response for document deletion
#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub success: bool,
    pub message: String,
    pub document_id: Uuid,
}

/// Accept a document upload and admit it to the processing queue.
///
/// The file is staged on disk under its document ID; processing happens
/// later, when the queue processor reaches this item. Responds with 202 and
/// the queue position.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file: Option<(String, Bytes)> = None;
    let mut category: Option<String> = None;
    let mut uploader_id: Option<String> = None;
    let mut uploader_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload".to_string());
                let data = field.bytes().await.map_err(|e| {
                    Error::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;
                file = Some((filename, data));
            }
            "category" => category = text_field(field).await?,
            "uploader_id" => uploader_id = text_field(field).await?,
            "uploader_name" => uploader_name = text_field(field).await?,
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| Error::InvalidRequest("No file provided".to_string()))?;

    if !extension_allowed(&filename) {
        return Err(Error::InvalidRequest(format!(
            "File type not allowed. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let category = category.unwrap_or_else(|| "general".to_string());
    let uploader_id = uploader_id.unwrap_or_else(|| "anonymous".to_string());
    let uploader_name = uploader_name.unwrap_or_else(|| "Anonymous".to_string());

    // Stage the upload under the document ID so queued files never collide
    let document_id = Uuid::new_v4();
    let staged_name = format!("{}.{}", document_id, file_extension(&filename));
    let staged_path = state.config().storage.upload_dir.join(staged_name);
    tokio::fs::write(&staged_path, &data).await?;

    let item = state.db().enqueue(
        document_id,
        &filename,
        &category,
        &staged_path.to_string_lossy(),
        data.len() as u64,
        &uploader_id,
        &uploader_name,
    )?;

    info!(
        "Queued upload: {} as document {} (position {})",
        filename, document_id, item.position
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id,
            filename,
            status: "queued".to_string(),
            queue_position: item.position,
            message: format!(
                "Document uploaded and queued at position {}. Processing will start automatically.",
                item.position
            ),
        }),
    ))
}

/// Read a text field, treating a blank value as absent
async fn text_field(field: Field<'_>) -> Result<Option<String>> {
    let value = field.text().await.map_err(|e| {
        Error::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// List processed documents with optional filters and pagination
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>> {
    let query = DocumentQuery {
        category: params.category,
        uploader_id: params.uploader_id,
        search: params.search,
        limit: params.limit.clamp(1, 100),
        offset: params.offset.max(0),
    };

    let documents = state.db().list_documents(&query)?;
    let total = state.db().count_documents(&query)?;

    Ok(Json(DocumentListResponse {
        documents,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Fetch one document's metadata
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentMetadata>> {
    state
        .db()
        .get_metadata(&document_id)?
        .filter(|meta| !meta.deleted)
        .map(Json)
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
}

/// Delete a document, soft by default
///
/// Soft deletion keeps the metadata row for audit; `hard_delete=true` removes
/// it. Either way the document's vectors are removed from the index.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<DeleteDocumentQuery>,
) -> Result<Json<DeleteDocumentResponse>> {
    let meta = state
        .db()
        .get_metadata(&document_id)?
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

    // Index cleanup is best-effort; the metadata row is authoritative
    match state.vector_index().delete_by_document(&document_id).await {
        Ok(removed) => info!("Removed {} vectors for document {}", removed, document_id),
        Err(e) => warn!("Failed to remove vectors for document {}: {}", document_id, e),
    }

    let message = if params.hard_delete {
        state.db().delete_metadata(&document_id)?;
        format!("Document {} permanently deleted", meta.filename)
    } else {
        state
            .db()
            .soft_delete_document(&document_id, &params.deleted_by)?;
        format!("Document {} deleted", meta.filename)
    };

    info!("{}", message);

    Ok(Json(DeleteDocumentResponse {
        success: true,
        message,
        document_id,
    }))
}
