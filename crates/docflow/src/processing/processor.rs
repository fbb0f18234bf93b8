//! Sequential queue processor
//!
//! A single long-lived task drains the upload queue in position order, one
//! document at a time. A pending item is removed from the queue the moment
//! work on it begins; from then on the durable metadata record is the
//! source of truth. Individual document failures never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ProcessingConfig;
use crate::error::Result;
use crate::events::ProgressBroadcaster;
use crate::ingestion::{IngestPipeline, PipelineOutcome};
use crate::storage::IngestDb;
use crate::types::{DocumentMetadata, ProcessingStatus};

/// Owns the background processing task and its lifecycle
pub struct QueueProcessor {
    db: Arc<IngestDb>,
    broadcaster: ProgressBroadcaster,
    pipeline: Arc<IngestPipeline>,
    poll_interval: Duration,
    cooldown: Duration,
    error_backoff: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueProcessor {
    pub fn new(
        config: &ProcessingConfig,
        db: Arc<IngestDb>,
        broadcaster: ProgressBroadcaster,
        pipeline: Arc<IngestPipeline>,
    ) -> Self {
        Self {
            db,
            broadcaster,
            pipeline,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the background loop. Calling this while the loop is already
    /// running is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if let Some(task) = handle.as_ref() {
            if !task.is_finished() {
                warn!("Queue processor is already running");
                return;
            }
        }

        let worker = Worker {
            db: Arc::clone(&self.db),
            broadcaster: self.broadcaster.clone(),
            pipeline: Arc::clone(&self.pipeline),
            poll_interval: self.poll_interval,
            cooldown: self.cooldown,
            error_backoff: self.error_backoff,
        };
        *handle = Some(tokio::spawn(worker.run()));
        info!("Queue processor started");
    }

    /// Abort the background loop if it is running
    pub async fn stop(&self) {
        let task = self.handle.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            info!("Queue processor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

struct Worker {
    db: Arc<IngestDb>,
    broadcaster: ProgressBroadcaster,
    pipeline: Arc<IngestPipeline>,
    poll_interval: Duration,
    cooldown: Duration,
    error_backoff: Duration,
}

impl Worker {
    async fn run(self) {
        info!("Queue processor running, draining pending uploads sequentially");

        loop {
            match self.step().await {
                Ok(true) => tokio::time::sleep(self.cooldown).await,
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    error!("Unexpected error in queue processor loop: {}", e);
                    tokio::time::sleep(self.error_backoff).await;
                    info!("Queue processor recovering from error, continuing");
                }
            }
        }
    }

    /// Handle at most one pending item. Returns whether an item was taken.
    async fn step(&self) -> Result<bool> {
        let item = match self.db.next_pending()? {
            Some(item) => item,
            None => return Ok(false),
        };

        info!(
            "Found pending item: {} (position {}), starting processing",
            item.filename, item.position
        );

        // Remove from the queue up front so it only ever lists waiting
        // documents, then create the metadata record the pipeline will
        // report progress against
        self.db.remove_from_queue(&item.queue_id)?;
        self.db.insert_metadata(&DocumentMetadata::processing(&item))?;

        self.broadcaster.broadcast_progress(
            item.document_id,
            ProcessingStatus::Processing,
            None,
            None,
            None,
            None,
        );

        match self.pipeline.process(&item).await {
            PipelineOutcome::Completed {
                chunk_count,
                processing_time,
            } => {
                info!(
                    "Document {} completed: {} chunks in {:.2}s",
                    item.filename, chunk_count, processing_time
                );
            }
            PipelineOutcome::Failed { message } => {
                error!("Failed to process document {}: {}", item.filename, message);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocflowConfig;
    use crate::ingestion::TextExtractor;
    use crate::providers::{EmbeddingProvider, MemoryVectorIndex, VectorIndexProvider};
    use async_trait::async_trait;
    use std::path::Path;
    use uuid::Uuid;

    /// Succeeds with fixed text unless the upload path contains "bad"
    struct PathSensitiveExtractor;

    #[async_trait]
    impl TextExtractor for PathSensitiveExtractor {
        async fn extract(&self, path: &Path) -> Result<String> {
            if path.to_string_lossy().contains("bad") {
                return Err(crate::error::Error::Extraction(
                    "unreadable scan".to_string(),
                ));
            }
            Ok(
                "A perfectly ordinary document with enough words to chunk. \
                 It even has a second sentence to make the point."
                    .to_string(),
            )
        }

        fn name(&self) -> &str {
            "path-sensitive-stub"
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn worker(db: Arc<IngestDb>, broadcaster: ProgressBroadcaster) -> Worker {
        let pipeline = Arc::new(IngestPipeline::new(
            &DocflowConfig::default(),
            Arc::clone(&db),
            broadcaster.clone(),
            Arc::new(PathSensitiveExtractor),
            Arc::new(StubEmbedder),
            Arc::new(MemoryVectorIndex::new()) as Arc<dyn VectorIndexProvider>,
        ));

        Worker {
            db,
            broadcaster,
            pipeline,
            poll_interval: Duration::from_millis(10),
            cooldown: Duration::from_millis(1),
            error_backoff: Duration::from_millis(10),
        }
    }

    fn enqueue(db: &IngestDb, filename: &str, marker: &str) -> Uuid {
        let document_id = Uuid::new_v4();
        db.enqueue(
            document_id,
            filename,
            "general",
            &format!("/tmp/docflow-test/{}-{}.pdf", marker, document_id),
            64,
            "user-1",
            "Test User",
        )
        .unwrap();
        document_id
    }

    #[tokio::test]
    async fn drains_queue_in_position_order() {
        let db = Arc::new(IngestDb::in_memory().unwrap());
        let worker = worker(Arc::clone(&db), ProgressBroadcaster::new());

        let first = enqueue(&db, "first.pdf", "ok");
        let second = enqueue(&db, "second.pdf", "ok");

        assert!(worker.step().await.unwrap());
        // The first item is gone and the second has been renumbered to the front
        let remaining = db.list_queue().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].document_id, second);
        assert_eq!(remaining[0].position, 1);
        let meta = db.get_metadata(&first).unwrap().unwrap();
        assert_eq!(meta.processing_status, ProcessingStatus::Completed);

        assert!(worker.step().await.unwrap());
        assert!(db.list_queue().unwrap().is_empty());

        // Nothing left to take
        assert!(!worker.step().await.unwrap());
    }

    #[tokio::test]
    async fn failed_document_does_not_block_the_next_one() {
        let db = Arc::new(IngestDb::in_memory().unwrap());
        let worker = worker(Arc::clone(&db), ProgressBroadcaster::new());

        let doomed = enqueue(&db, "doomed.pdf", "bad");
        let healthy = enqueue(&db, "healthy.pdf", "ok");

        assert!(worker.step().await.unwrap());
        let meta = db.get_metadata(&doomed).unwrap().unwrap();
        assert_eq!(meta.processing_status, ProcessingStatus::Failed);
        assert!(meta
            .error_message
            .as_deref()
            .unwrap()
            .contains("unreadable scan"));

        assert!(worker.step().await.unwrap());
        let meta = db.get_metadata(&healthy).unwrap().unwrap();
        assert_eq!(meta.processing_status, ProcessingStatus::Completed);

        let stats = db.stats().unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn metadata_is_created_when_processing_starts() {
        let db = Arc::new(IngestDb::in_memory().unwrap());
        let worker = worker(Arc::clone(&db), ProgressBroadcaster::new());

        let document_id = enqueue(&db, "report.pdf", "ok");
        // No metadata while the item is still queued
        assert!(db.get_metadata(&document_id).unwrap().is_none());

        worker.step().await.unwrap();
        let meta = db.get_metadata(&document_id).unwrap().unwrap();
        assert_eq!(meta.filename, "report.pdf");
        assert_eq!(meta.file_extension, "pdf");
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts_the_loop() {
        let db = Arc::new(IngestDb::in_memory().unwrap());
        let broadcaster = ProgressBroadcaster::new();
        let pipeline = Arc::new(IngestPipeline::new(
            &DocflowConfig::default(),
            Arc::clone(&db),
            broadcaster.clone(),
            Arc::new(PathSensitiveExtractor),
            Arc::new(StubEmbedder),
            Arc::new(MemoryVectorIndex::new()) as Arc<dyn VectorIndexProvider>,
        ));
        let processor = QueueProcessor::new(
            &ProcessingConfig::default(),
            db,
            broadcaster,
            pipeline,
        );

        assert!(!processor.is_running());
        processor.start();
        assert!(processor.is_running());
        processor.start();
        assert!(processor.is_running());

        processor.stop().await;
        assert!(!processor.is_running());
    }
}
