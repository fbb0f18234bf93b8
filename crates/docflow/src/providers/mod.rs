//! Provider abstractions for embeddings and vector storage
//!
//! Backends are selected at startup from configuration and injected into the
//! ingestion pipeline as trait objects.

pub mod embedding;
pub mod http_index;
pub mod memory;
pub mod ollama;
pub mod vector_index;

pub use embedding::EmbeddingProvider;
pub use http_index::HttpVectorIndex;
pub use memory::MemoryVectorIndex;
pub use ollama::OllamaEmbedder;
pub use vector_index::{VectorIndexProvider, VectorRecord};
