//! Background queue processing and startup recovery

mod processor;
mod recovery;

pub use processor::QueueProcessor;
pub use recovery::recover_orphaned_documents;
