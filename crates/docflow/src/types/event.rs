//! Progress events broadcast to live subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::ProcessingStatus;

/// A progress update for one document
///
/// Events are ephemeral: the broadcaster stamps `timestamp` at delivery time
/// and fans the event out to whoever is subscribed at that moment. Nothing
/// is persisted or replayed for late subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub document_id: Uuid,
    pub processing_status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProgressEvent {
    /// A bare status-change event
    pub fn status(document_id: Uuid, status: ProcessingStatus) -> Self {
        Self {
            document_id,
            processing_status: status,
            processing_step: None,
            processing_progress: None,
            error_message: None,
            chunk_count: None,
            timestamp: None,
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.processing_step = Some(step.into());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.processing_progress = Some(progress);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_chunk_count(mut self, count: u32) -> Self {
        self.chunk_count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted_from_json() {
        let event = ProgressEvent::status(Uuid::new_v4(), ProcessingStatus::Processing)
            .with_step("chunking")
            .with_progress(30);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["processing_status"], "processing");
        assert_eq!(json["processing_step"], "chunking");
        assert_eq!(json["processing_progress"], 30);
        assert!(json.get("error_message").is_none());
        assert!(json.get("chunk_count").is_none());
        assert!(json.get("timestamp").is_none());
    }
}
