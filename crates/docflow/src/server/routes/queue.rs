//! Queue administration routes

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueueItem, QueueItemStatus, QueueStats};

/// Response for queue listing
#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub items: Vec<QueueItem>,
    pub total: usize,
}

/// Response for removing one queue item
#[derive(Debug, Serialize)]
pub struct RemoveQueueItemResponse {
    pub success: bool,
    pub message: String,
    pub queue_id: String,
}

/// Response for clearing the queue
#[derive(Debug, Serialize)]
pub struct ClearQueueResponse {
    pub success: bool,
    pub message: String,
    pub deleted_count: usize,
}

/// List the upload queue in position order
pub async fn list_queue(State(state): State<AppState>) -> Result<Json<QueueListResponse>> {
    let items = state.db().list_queue()?;
    let total = items.len();
    Ok(Json(QueueListResponse { items, total }))
}

/// Queue and processing statistics
pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStats>> {
    Ok(Json(state.db().stats()?))
}

/// Remove one item from the queue before it is processed
pub async fn remove_queue_item(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
) -> Result<Json<RemoveQueueItemResponse>> {
    let item = state
        .db()
        .get_queue_item(&queue_id)?
        .ok_or_else(|| Error::QueueItemNotFound(queue_id.clone()))?;

    if !matches!(
        item.status,
        QueueItemStatus::Pending | QueueItemStatus::Processing
    ) {
        let status = format!("{:?}", item.status).to_lowercase();
        return Err(Error::InvalidRequest(format!(
            "Cannot remove queue item with status '{}'",
            status
        )));
    }

    cleanup_queued_upload(&state, &item).await;
    state.db().remove_from_queue(&queue_id)?;

    info!("Removed {} from the queue", item.filename);

    Ok(Json(RemoveQueueItemResponse {
        success: true,
        message: format!("Removed {} from the queue", item.filename),
        queue_id,
    }))
}

/// Clear the entire upload queue
pub async fn clear_queue(State(state): State<AppState>) -> Result<Json<ClearQueueResponse>> {
    let items = state.db().list_queue()?;
    let mut deleted_count = 0;

    for item in &items {
        cleanup_queued_upload(&state, item).await;
        if state.db().remove_from_queue(&item.queue_id)? {
            deleted_count += 1;
        }
    }

    info!("Cleared the upload queue ({} items)", deleted_count);

    Ok(Json(ClearQueueResponse {
        success: true,
        message: format!("Cleared {} item(s) from the queue", deleted_count),
        deleted_count,
    }))
}

/// Delete the staged file and any metadata row for a queued item.
/// Both are tolerant of the other side not existing.
async fn cleanup_queued_upload(state: &AppState, item: &QueueItem) {
    match state.db().delete_metadata(&item.document_id) {
        Ok(_) => {}
        Err(e) => warn!("Failed to delete metadata for {}: {}", item.document_id, e),
    }

    match tokio::fs::remove_file(&item.file_path).await {
        Ok(()) => debug!("Removed staged upload {}", item.file_path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged upload {}: {}", item.file_path, e),
    }
}
