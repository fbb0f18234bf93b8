//! Startup recovery for documents orphaned by an unclean restart
//!
//! A document whose metadata still says `processing` after the process died
//! can never finish: its queue entry was consumed when work began, so no
//! processor will ever pick it up again. On startup, records stuck in a
//! non-terminal status past the staleness threshold are forced to `failed`
//! with a re-upload hint. The queue itself is left untouched; pending items
//! are durable and will be drained normally once the processor starts.

use chrono::{Duration, Utc};
use tracing::{error, info};

use crate::storage::IngestDb;

/// Error message stored on documents stranded mid-flight by a restart
const INTERRUPTED_MESSAGE: &str =
    "Processing interrupted by server restart. Please re-upload the document.";

/// Mark stale in-flight documents as failed. Returns the number repaired.
///
/// Must run before the queue processor starts. A recovery failure is logged
/// and swallowed so it never blocks startup.
pub fn recover_orphaned_documents(db: &IngestDb, stale_after_minutes: i64) -> usize {
    let cutoff = Utc::now() - Duration::minutes(stale_after_minutes);

    match db.recover_stale_documents(cutoff, INTERRUPTED_MESSAGE) {
        Ok(0) => {
            info!("Startup recovery: no orphaned documents found");
            0
        }
        Ok(repaired) => {
            info!(
                "Startup recovery: marked {} orphaned document(s) as failed",
                repaired
            );
            repaired
        }
        Err(e) => {
            error!("Startup recovery failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentMetadata, ProcessingStatus};
    use uuid::Uuid;

    fn metadata(status: ProcessingStatus, age_minutes: i64) -> DocumentMetadata {
        DocumentMetadata {
            document_id: Uuid::new_v4(),
            filename: "doc.pdf".to_string(),
            category: "general".to_string(),
            uploader_id: "user-1".to_string(),
            uploader_name: "User One".to_string(),
            upload_date: Utc::now() - Duration::minutes(age_minutes),
            file_size_bytes: 1000,
            file_extension: "pdf".to_string(),
            processing_status: status,
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

    #[test]
    fn marks_only_stale_inflight_documents() {
        let db = IngestDb::in_memory().unwrap();

        let orphan = metadata(ProcessingStatus::Processing, 45);
        let running = metadata(ProcessingStatus::Processing, 5);
        let finished = metadata(ProcessingStatus::Completed, 90);
        db.insert_metadata(&orphan).unwrap();
        db.insert_metadata(&running).unwrap();
        db.insert_metadata(&finished).unwrap();

        assert_eq!(recover_orphaned_documents(&db, 30), 1);

        let repaired = db.get_metadata(&orphan.document_id).unwrap().unwrap();
        assert_eq!(repaired.processing_status, ProcessingStatus::Failed);
        assert_eq!(
            repaired.error_message.as_deref(),
            Some("Processing interrupted by server restart. Please re-upload the document.")
        );

        let untouched = db.get_metadata(&running.document_id).unwrap().unwrap();
        assert_eq!(untouched.processing_status, ProcessingStatus::Processing);
    }

    #[test]
    fn returns_zero_when_nothing_is_stale() {
        let db = IngestDb::in_memory().unwrap();
        db.insert_metadata(&metadata(ProcessingStatus::Completed, 120))
            .unwrap();

        assert_eq!(recover_orphaned_documents(&db, 30), 0);
    }
}
