//! Text extraction backends

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

/// Extracts text content from an uploaded document file
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the file at `path`
    async fn extract(&self, path: &Path) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Reads the file as UTF-8 text without format-specific parsing. Suitable
/// for plain text uploads and as the default when no partition service is
/// configured.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Extraction(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn name(&self) -> &str {
        "plain-text"
    }
}

#[derive(Debug, Deserialize)]
struct PartitionElement {
    #[serde(default)]
    text: String,
}

/// Sends the file to an unstructured-compatible partition API and joins the
/// text of the returned elements
pub struct HttpExtractor {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl TextExtractor for HttpExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let file_bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Extraction(format!("Failed to read {}: {}", path.display(), e)))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        debug!(
            "Sending {} ({} bytes) to partition API",
            file_name,
            file_bytes.len()
        );

        let part = multipart::Part::bytes(file_bytes).file_name(file_name);
        let form = multipart::Form::new().part("files", part);

        let mut request = self.client.post(&self.api_url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("unstructured-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("Partition API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "Partition API returned {}: {}",
                status, body
            )));
        }

        let elements: Vec<PartitionElement> = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Failed to parse partition response: {}", e)))?;

        let text = elements
            .iter()
            .map(|e| e.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(text)
    }

    fn name(&self) -> &str {
        "unstructured-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn plain_extractor_reads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hello from disk").unwrap();

        let text = PlainTextExtractor.extract(file.path()).await.unwrap();
        assert_eq!(text, "hello from disk");
    }

    #[tokio::test]
    async fn plain_extractor_reports_missing_file() {
        let err = PlainTextExtractor
            .extract(Path::new("/nonexistent/docflow-test.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
