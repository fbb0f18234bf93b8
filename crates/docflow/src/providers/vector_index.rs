//! Vector index provider trait and record type

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A vector with its chunk metadata, addressed by a stable string id so
/// re-ingesting a document overwrites instead of duplicating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Stable identifier of the form `{document_id}_chunk{index}`
    pub id: String,
    /// Embedding values
    pub values: Vec<f32>,
    /// Chunk metadata stored alongside the vector
    pub metadata: serde_json::Value,
}

/// Trait for vector storage
///
/// Implementations:
/// - `MemoryVectorIndex`: in-process map for tests and single-node setups
/// - `HttpVectorIndex`: remote index behind a Pinecone-compatible HTTP API
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Insert or overwrite vectors by id
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Delete all vectors belonging to a document
    ///
    /// Returns how many vectors were removed when the backend reports it,
    /// zero otherwise.
    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize>;

    /// Total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if the index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
