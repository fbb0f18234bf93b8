//! Application state for the docflow server

use std::sync::Arc;

use crate::config::{DocflowConfig, ExtractionBackend, VectorIndexBackend};
use crate::error::Result;
use crate::events::ProgressBroadcaster;
use crate::ingestion::{HttpExtractor, IngestPipeline, PlainTextExtractor, TextExtractor};
use crate::processing::{recover_orphaned_documents, QueueProcessor};
use crate::providers::{
    EmbeddingProvider, HttpVectorIndex, MemoryVectorIndex, OllamaEmbedder, VectorIndexProvider,
};
use crate::storage::IngestDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: DocflowConfig,
    /// Durable queue and document metadata store
    db: Arc<IngestDb>,
    /// Live progress hub
    broadcaster: ProgressBroadcaster,
    /// Vector index (memory or remote HTTP)
    vector_index: Arc<dyn VectorIndexProvider>,
    /// Background queue processor
    processor: QueueProcessor,
}

impl AppState {
    /// Create application state: open storage, wire up the configured
    /// providers, and build the queue processor. The processor does not
    /// start draining until `start_processing` is called.
    pub fn new(config: DocflowConfig) -> Result<Self> {
        tracing::info!("Initializing docflow application state");

        if let Some(parent) = config.storage.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.storage.upload_dir)?;

        let db = Arc::new(IngestDb::new(&config.storage.database_path)?);
        tracing::info!(
            "Database opened at {}",
            config.storage.database_path.display()
        );

        let broadcaster = ProgressBroadcaster::new();

        let extractor: Arc<dyn TextExtractor> = match config.extraction.backend {
            ExtractionBackend::Plain => Arc::new(PlainTextExtractor),
            ExtractionBackend::Http => Arc::new(HttpExtractor::new(&config.extraction)),
        };

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OllamaEmbedder::new(&config.embedding));

        let vector_index: Arc<dyn VectorIndexProvider> = match config.vector_index.backend {
            VectorIndexBackend::Memory => Arc::new(MemoryVectorIndex::new()),
            VectorIndexBackend::Http => Arc::new(HttpVectorIndex::new(&config.vector_index)),
        };

        tracing::info!(
            "Providers initialized (extractor: {}, embedder: {}, index: {})",
            extractor.name(),
            embedder.name(),
            vector_index.name()
        );

        let pipeline = Arc::new(IngestPipeline::new(
            &config,
            Arc::clone(&db),
            broadcaster.clone(),
            extractor,
            embedder,
            Arc::clone(&vector_index),
        ));

        let processor = QueueProcessor::new(
            &config.processing,
            Arc::clone(&db),
            broadcaster.clone(),
            pipeline,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                broadcaster,
                vector_index,
                processor,
            }),
        })
    }

    /// Repair documents stranded by the previous run, then start the queue
    /// processor. Called once at server startup; recovery must finish before
    /// the processor takes its first item.
    pub fn start_processing(&self) {
        recover_orphaned_documents(
            &self.inner.db,
            self.inner.config.processing.stale_after_minutes,
        );
        self.inner.processor.start();
    }

    /// Stop the queue processor
    pub async fn stop_processing(&self) {
        self.inner.processor.stop().await;
    }

    /// Get configuration
    pub fn config(&self) -> &DocflowConfig {
        &self.inner.config
    }

    /// Get the storage handle
    pub fn db(&self) -> &Arc<IngestDb> {
        &self.inner.db
    }

    /// Get the progress broadcast hub
    pub fn broadcaster(&self) -> &ProgressBroadcaster {
        &self.inner.broadcaster
    }

    /// Get the vector index provider
    pub fn vector_index(&self) -> &Arc<dyn VectorIndexProvider> {
        &self.inner.vector_index
    }
}
