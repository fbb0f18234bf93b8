//! Upload queue types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an item in the upload queue
///
/// Normal operation only ever stores `Pending` items; the other values exist
/// for wire compatibility and so that orphaned rows left behind by older
/// deployments can still be removed administratively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A document waiting in the upload queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue entry ID, derived from the document ID
    pub queue_id: String,
    /// Document this entry admits
    pub document_id: Uuid,
    /// Original filename as uploaded
    pub filename: String,
    /// Document category
    pub category: String,
    /// Staged upload location on disk
    pub file_path: String,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Uploader identity
    pub uploader_id: String,
    /// Uploader display name
    pub uploader_name: String,
    /// Queue status
    pub status: QueueItemStatus,
    /// Dense 1-indexed position within the queue
    pub position: i64,
    /// When the item was admitted
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl QueueItem {
    /// Derive the queue entry ID for a document
    pub fn queue_id_for(document_id: &Uuid) -> String {
        format!("queue_{}", document_id)
    }
}

/// Aggregate queue statistics
///
/// `pending` is counted from the queue itself; `processing`, `completed`,
/// and `failed` are counted from document metadata, since those documents
/// have already left the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_id_is_derived_from_document_id() {
        let id = Uuid::new_v4();
        assert_eq!(QueueItem::queue_id_for(&id), format!("queue_{}", id));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&QueueItemStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
