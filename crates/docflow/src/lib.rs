//! docflow: document ingestion backend with a sequential upload queue
//!
//! Uploaded files are admitted to a durable, strictly ordered queue and
//! drained one at a time by a background processor: text extraction,
//! sentence-aware chunking, batched embedding, and vector storage, with
//! live progress events streamed to subscribed clients over SSE. Documents
//! left mid-flight by an unclean shutdown are repaired at startup.

pub mod config;
pub mod error;
pub mod events;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

pub use config::DocflowConfig;
pub use error::{Error, Result};
pub use events::{ProgressBroadcaster, Subscription};
pub use types::{
    document::{DocumentMetadata, ProcessingStatus, ProcessingStep},
    event::ProgressEvent,
    queue::{QueueItem, QueueItemStatus, QueueStats},
};
