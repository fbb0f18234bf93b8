//! Document ingestion: extraction, chunking, and the per-document pipeline

mod chunker;
mod extractor;
mod pipeline;

pub use chunker::TextChunker;
pub use extractor::{HttpExtractor, PlainTextExtractor, TextExtractor};
pub use pipeline::{IngestPipeline, PipelineOutcome};
