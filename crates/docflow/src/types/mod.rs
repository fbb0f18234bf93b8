//! Core types for the ingestion system

pub mod document;
pub mod event;
pub mod queue;

pub use document::{
    extension_allowed, file_extension, DocumentMetadata, ProcessingStatus, ProcessingStep,
    ALLOWED_EXTENSIONS,
};
pub use event::ProgressEvent;
pub use queue::{QueueItem, QueueItemStatus, QueueStats};
