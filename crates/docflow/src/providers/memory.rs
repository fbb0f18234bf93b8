//! In-memory vector index
//!
//! Process-local storage used by tests and single-node deployments where no
//! external index is configured. Contents do not survive a restart.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::providers::vector_index::{VectorIndexProvider, VectorRecord};

/// Vector index backed by a concurrent in-process map
#[derive(Default)]
pub struct MemoryVectorIndex {
    vectors: DashMap<String, VectorRecord>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndexProvider for MemoryVectorIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        for record in records {
            self.vectors.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let doc_id = document_id.to_string();
        let stale: Vec<String> = self
            .vectors
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .metadata
                    .get("document_id")
                    .and_then(|v| v.as_str())
                    == Some(doc_id.as_str())
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in &stale {
            if self.vectors.remove(key).is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.vectors.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(document_id: &Uuid, index: usize) -> VectorRecord {
        VectorRecord {
            id: format!("{}_chunk{}", document_id, index),
            values: vec![0.1, 0.2, 0.3],
            metadata: json!({
                "document_id": document_id.to_string(),
                "chunk_index": index,
            }),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = MemoryVectorIndex::new();
        let doc = Uuid::new_v4();
        let records = vec![record(&doc, 0), record(&doc, 1)];

        index.upsert(&records).await.unwrap();
        index.upsert(&records).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_removes_only_the_given_document() {
        let index = MemoryVectorIndex::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();

        index
            .upsert(&[record(&keep, 0), record(&drop, 0), record(&drop, 1)])
            .await
            .unwrap();

        let removed = index.delete_by_document(&drop).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len().await.unwrap(), 1);

        let removed_again = index.delete_by_document(&drop).await.unwrap();
        assert_eq!(removed_again, 0);
    }
}
