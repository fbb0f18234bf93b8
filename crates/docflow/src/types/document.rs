//! Document metadata types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::queue::QueueItem;

/// File extensions accepted by the upload endpoint
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "pptx", "xlsx", "xls", "ppt", "jpg", "jpeg", "png", "gif",
];

/// Processing lifecycle of a document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Upload accepted but processing not yet begun. The current flow
    /// creates records directly in `Processing`; this value survives for
    /// rows written by older deployments and is recognized by recovery.
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Terminal states are never left except by startup recovery
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// Pipeline phase labels reported while a document is processing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    ExtractingText,
    Chunking,
    GeneratingEmbeddings,
    StoringVectors,
}

impl ProcessingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStep::ExtractingText => "extracting_text",
            ProcessingStep::Chunking => "chunking",
            ProcessingStep::GeneratingEmbeddings => "generating_embeddings",
            ProcessingStep::StoringVectors => "storing_vectors",
        }
    }
}

/// Durable record of a document's processing lifecycle
///
/// Created only when the queue processor begins work on a document, never at
/// upload time, so a document is either queued or tracked here but never
/// both at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: Uuid,
    pub filename: String,
    pub category: String,
    pub uploader_id: String,
    pub uploader_name: String,
    pub upload_date: DateTime<Utc>,
    pub file_size_bytes: u64,
    pub file_extension: String,
    pub processing_status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,
    pub processing_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DocumentMetadata {
    /// Create the record for a document entering the pipeline
    pub fn processing(item: &QueueItem) -> Self {
        Self {
            document_id: item.document_id,
            filename: item.filename.clone(),
            category: item.category.clone(),
            uploader_id: item.uploader_id.clone(),
            uploader_name: item.uploader_name.clone(),
            upload_date: Utc::now(),
            file_size_bytes: item.file_size_bytes,
            file_extension: file_extension(&item.file_path),
            processing_status: ProcessingStatus::Processing,
            processing_step: None,
            processing_progress: 0,
            chunk_count: None,
            error_message: None,
            processing_time_seconds: None,
            deleted: false,
            deleted_by: None,
            deleted_at: None,
        }
    }
}

/// File extension of a path or filename, lowercased, without the dot.
/// Empty when there is no extension.
pub fn file_extension(path: &str) -> String {
    path_extension_lower(path).unwrap_or_default()
}

/// Check an upload filename against the allowed extension set
pub fn extension_allowed(filename: &str) -> bool {
    match path_extension_lower(filename) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

fn path_extension_lower(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(extension_allowed("report.PDF"));
        assert!(extension_allowed("slides.pptx"));
        assert!(!extension_allowed("notes.txt"));
        assert!(!extension_allowed("no_extension"));
    }

    #[test]
    fn extension_of_path() {
        assert_eq!(file_extension("/tmp/uploads/abc.docx"), "docx");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("plainfile"), "");
    }

    #[test]
    fn step_labels() {
        assert_eq!(ProcessingStep::ExtractingText.as_str(), "extracting_text");
        assert_eq!(
            serde_json::to_string(&ProcessingStep::GeneratingEmbeddings).unwrap(),
            "\"generating_embeddings\""
        );
    }
}
