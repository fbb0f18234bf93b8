//! Document ingestion pipeline
//!
//! Runs one queued upload end-to-end: extract text, chunk it, embed the
//! chunks, and upsert the vectors. Every stage transition is written to the
//! metadata store and broadcast to live subscribers. Failures are recorded
//! on the document and never propagate to the caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

use crate::config::DocflowConfig;
use crate::error::{Error, Result};
use crate::events::ProgressBroadcaster;
use crate::ingestion::chunker::TextChunker;
use crate::ingestion::extractor::TextExtractor;
use crate::providers::{EmbeddingProvider, VectorIndexProvider, VectorRecord};
use crate::storage::IngestDb;
use crate::types::{ProcessingStatus, ProcessingStep, QueueItem};

/// Characters of chunk text kept in vector metadata
const METADATA_TEXT_CHARS: usize = 1000;

/// Terminal result of one pipeline run. Failure is already recorded on the
/// document by the time this is returned; the caller only decides how to
/// log it.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        chunk_count: u32,
        processing_time: f64,
    },
    Failed {
        message: String,
    },
}

/// Orchestrates extraction, chunking, embedding, and vector storage for a
/// single document at a time
pub struct IngestPipeline {
    db: Arc<IngestDb>,
    broadcaster: ProgressBroadcaster,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexProvider>,
    chunker: TextChunker,
    embed_batch_size: usize,
    index_batch_size: usize,
    heartbeat_interval: Duration,
}

impl IngestPipeline {
    pub fn new(
        config: &DocflowConfig,
        db: Arc<IngestDb>,
        broadcaster: ProgressBroadcaster,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexProvider>,
    ) -> Self {
        Self {
            db,
            broadcaster,
            extractor,
            embedder,
            index,
            chunker: TextChunker::from_config(&config.ingest),
            embed_batch_size: config.embedding.batch_size.max(1),
            index_batch_size: config.vector_index.batch_size.max(1),
            heartbeat_interval: Duration::from_secs(config.processing.heartbeat_interval_secs),
        }
    }

    /// Process one queued upload. On failure the document is marked failed
    /// with the error message and the failure is broadcast; the uploaded
    /// temp file is removed on both paths.
    pub async fn process(&self, item: &QueueItem) -> PipelineOutcome {
        let started = std::time::Instant::now();
        info!(
            "[{}] Starting ingestion for document {}",
            item.filename, item.document_id
        );

        let outcome = match self.run_stages(item, started).await {
            Ok((chunk_count, processing_time)) => PipelineOutcome::Completed {
                chunk_count,
                processing_time,
            },
            Err(e) => {
                let processing_time = round_to_hundredths(started.elapsed().as_secs_f64());
                let message = e.to_string();

                if let Err(db_err) =
                    self.db
                        .mark_failed(&item.document_id, &message, Some(processing_time))
                {
                    error!("[{}] Failed to record failure: {}", item.filename, db_err);
                }
                self.broadcaster.broadcast_progress(
                    item.document_id,
                    ProcessingStatus::Failed,
                    None,
                    None,
                    Some(&message),
                    None,
                );
                warn!(
                    "[{}] Ingestion failed after {:.2}s: {}",
                    item.filename, processing_time, message
                );

                PipelineOutcome::Failed { message }
            }
        };

        self.remove_upload(&item.file_path).await;
        outcome
    }

    async fn run_stages(
        &self,
        item: &QueueItem,
        started: std::time::Instant,
    ) -> Result<(u32, f64)> {
        self.advance_stage(item, ProcessingStep::ExtractingText, 0)?;

        info!("[{}] Extracting text", item.filename);
        let text = self.extract_with_heartbeat(item).await?;
        if text.trim().chars().count() < 10 {
            return Err(Error::Validation(
                "No text content extracted from document".to_string(),
            ));
        }
        info!(
            "[{}] Extracted {} characters",
            item.filename,
            text.chars().count()
        );

        self.advance_stage(item, ProcessingStep::Chunking, 30)?;
        let chunks = self.chunker.chunk_text(&text);
        if chunks.is_empty() {
            return Err(Error::Validation(
                "No chunks created from document text".to_string(),
            ));
        }
        info!("[{}] Created {} chunks", item.filename, chunks.len());

        self.advance_stage(item, ProcessingStep::GeneratingEmbeddings, 50)?;
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.embed_batch_size) {
            embeddings.extend(self.embedder.embed_batch(batch).await?);
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::Validation(format!(
                "Chunk count ({}) doesn't match embedding count ({})",
                chunks.len(),
                embeddings.len()
            )));
        }

        self.advance_stage(item, ProcessingStep::StoringVectors, 80)?;
        let records = build_vector_records(item, &chunks, embeddings);
        for batch in records.chunks(self.index_batch_size) {
            self.index.upsert(batch).await?;
        }
        info!(
            "[{}] Stored {} vectors in {}",
            item.filename,
            records.len(),
            self.index.name()
        );

        let chunk_count = chunks.len() as u32;
        let processing_time = round_to_hundredths(started.elapsed().as_secs_f64());
        self.db
            .mark_completed(&item.document_id, chunk_count, processing_time)?;
        self.broadcaster.broadcast_progress(
            item.document_id,
            ProcessingStatus::Completed,
            None,
            Some(100),
            None,
            Some(chunk_count),
        );
        info!(
            "[{}] Completed: {} chunks in {:.2}s",
            item.filename, chunk_count, processing_time
        );

        Ok((chunk_count, processing_time))
    }

    /// Run extraction off the scheduling thread, emitting a conservative
    /// time-based progress estimate while it is in flight. The estimate
    /// climbs to at most 25% over three minutes and is only written when it
    /// increases; it stops the instant extraction finishes.
    async fn extract_with_heartbeat(&self, item: &QueueItem) -> Result<String> {
        let path = PathBuf::from(&item.file_path);
        let extractor = Arc::clone(&self.extractor);
        let mut extraction = tokio::spawn(async move { extractor.extract(&path).await });

        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        ticker.tick().await; // first tick completes immediately
        let mut last_progress = 0u8;

        loop {
            tokio::select! {
                joined = &mut extraction => {
                    return match joined {
                        Ok(result) => result,
                        Err(e) => Err(Error::Internal(format!("Extraction task failed: {}", e))),
                    };
                }
                _ = ticker.tick() => {
                    let elapsed = started.elapsed().as_secs_f64();
                    let estimate = (((elapsed / 180.0) * 30.0) as u8).min(25);

                    if estimate > last_progress {
                        if let Err(e) = self.db.update_progress(&item.document_id, estimate) {
                            warn!("[{}] Failed to record extraction heartbeat: {}", item.filename, e);
                        }
                        self.broadcaster.broadcast_progress(
                            item.document_id,
                            ProcessingStatus::Processing,
                            Some(ProcessingStep::ExtractingText.as_str()),
                            Some(estimate),
                            None,
                            None,
                        );
                        info!(
                            "[{}] Extraction heartbeat: {}% ({:.0}s elapsed)",
                            item.filename, estimate, elapsed
                        );
                        last_progress = estimate;
                    }
                }
            }
        }
    }

    fn advance_stage(&self, item: &QueueItem, step: ProcessingStep, progress: u8) -> Result<()> {
        self.db.update_stage(&item.document_id, step, progress)?;
        self.broadcaster.broadcast_progress(
            item.document_id,
            ProcessingStatus::Processing,
            Some(step.as_str()),
            Some(progress),
            None,
            None,
        );
        Ok(())
    }

    async fn remove_upload(&self, file_path: &str) {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => info!("Cleaned up temporary file: {}", file_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up temporary file {}: {}", file_path, e),
        }
    }
}

/// Pair chunks with their embeddings under deterministic ids, so
/// reprocessing the same document overwrites its vectors instead of
/// duplicating them
fn build_vector_records(
    item: &QueueItem,
    chunks: &[String],
    embeddings: Vec<Vec<f32>>,
) -> Vec<VectorRecord> {
    chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (chunk, values))| VectorRecord {
            id: format!("{}_chunk{}", item.document_id, index),
            values,
            metadata: json!({
                "document_id": item.document_id.to_string(),
                "filename": item.filename,
                "category": item.category,
                "uploader_name": item.uploader_name,
                "chunk_index": index,
                "text_content": chunk.chars().take(METADATA_TEXT_CHARS).collect::<String>(),
            }),
        })
        .collect()
}

fn round_to_hundredths(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}
