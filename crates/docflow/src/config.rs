//! Configuration for the docflow server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main docflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocflowConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable storage locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chunking configuration
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Queue processor timing
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Embedding provider (Ollama) configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Vector index configuration
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    /// Text extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl DocflowConfig {
    /// Load configuration from a TOML file. A missing file is not an error,
    /// defaults apply.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Durable storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub database_path: PathBuf,
    /// Directory where uploads are staged until processed
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docflow");

        Self {
            database_path: data_dir.join("docflow.db"),
            upload_dir: std::env::temp_dir().join("docflow-uploads"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Target chunk size in tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Token overlap carried between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks at or below this token count are discarded as noise
    #[serde(default = "default_min_chunk_tokens")]
    pub min_chunk_tokens: usize,
}

fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_min_chunk_tokens() -> usize { 10 }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_tokens: 10,
        }
    }
}

/// Queue processor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Sleep between polls when the queue is empty, in seconds
    pub poll_interval_secs: u64,
    /// Pause between consecutive documents, in seconds
    pub cooldown_secs: u64,
    /// Backoff after an unexpected processor-loop error, in seconds
    pub error_backoff_secs: u64,
    /// Interval between extraction heartbeat updates, in seconds
    pub heartbeat_interval_secs: u64,
    /// Age in minutes beyond which a processing/uploading document is
    /// presumed abandoned by a crashed process
    pub stale_after_minutes: i64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            cooldown_secs: 1,
            error_backoff_secs: 5,
            heartbeat_interval_secs: 15,
            stale_after_minutes: 30,
        }
    }
}

/// Embedding provider (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per embedding batch
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 100,
            timeout_secs: 120,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Backend provider (memory or http)
    #[serde(default)]
    pub backend: VectorIndexBackend,
    /// Base URL of the remote vector service (http backend)
    pub base_url: String,
    /// Logical index name vectors are written under
    pub index: String,
    /// API key for the remote vector service (optional)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vectors per upsert batch
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorIndexBackend::default(),
            base_url: "http://localhost:7700".to_string(),
            index: "documents".to_string(),
            api_key: None,
            batch_size: 100,
            timeout_secs: 60,
        }
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum VectorIndexBackend {
    /// In-process index, useful for development and tests
    #[default]
    Memory,
    /// Remote HTTP vector service
    Http,
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Backend provider (plain or http)
    #[serde(default)]
    pub backend: ExtractionBackend,
    /// Extraction API URL (http backend)
    #[serde(default = "default_extraction_url")]
    pub api_url: String,
    /// Extraction API key (optional, free tier if not set)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

fn default_extraction_url() -> String {
    "https://api.unstructured.io/general/v0/general".to_string()
}

fn default_extraction_timeout() -> u64 {
    600
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: ExtractionBackend::default(),
            api_url: default_extraction_url(),
            api_key: None,
            timeout_secs: 600,
        }
    }
}

/// Extraction backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionBackend {
    /// Read the staged file as UTF-8 text
    #[default]
    Plain,
    /// Unstructured-style extraction API
    Http,
}
