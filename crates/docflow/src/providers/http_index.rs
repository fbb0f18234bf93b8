//! HTTP vector index provider
//!
//! Talks to a Pinecone-compatible REST API: vectors are upserted in batches
//! and deleted with a document_id metadata filter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};
use crate::providers::vector_index::{VectorIndexProvider, VectorRecord};

/// Remote vector index behind a Pinecone-compatible HTTP API
pub struct HttpVectorIndex {
    client: Client,
    base_url: String,
    namespace: String,
    api_key: Option<String>,
    batch_size: usize,
}

impl HttpVectorIndex {
    pub fn new(config: &VectorIndexConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            namespace: config.index.clone(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key);
        }
        request
    }
}

#[derive(Default, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: usize,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(default, rename = "totalVectorCount")]
    total_vector_count: usize,
}

#[async_trait]
impl VectorIndexProvider for HttpVectorIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        for batch in records.chunks(self.batch_size) {
            let request = json!({
                "vectors": batch,
                "namespace": self.namespace,
            });

            let response = self
                .post("/vectors/upsert")
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::VectorIndex(format!("Vector upsert failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::VectorIndex(format!(
                    "Vector upsert failed ({}): {}",
                    status, body
                )));
            }
        }

        Ok(())
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let request = json!({
            "filter": { "document_id": document_id.to_string() },
            "namespace": self.namespace,
        });

        let response = self
            .post("/vectors/delete")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Vector delete failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::VectorIndex(format!(
                "Vector delete failed ({}): {}",
                status, body
            )));
        }

        // Not all backends report a count; treat a bare response as zero
        let deleted: DeleteResponse = response.json().await.unwrap_or_default();
        Ok(deleted.deleted)
    }

    async fn len(&self) -> Result<usize> {
        let response = self
            .post("/describe_index_stats")
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Index stats request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::VectorIndex(format!(
                "Index stats request failed ({}): {}",
                status, body
            )));
        }

        let stats: StatsResponse = response
            .json()
            .await
            .map_err(|e| Error::VectorIndex(format!("Failed to parse index stats: {}", e)))?;

        Ok(stats.total_vector_count)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "http-index"
    }
}
