//! Durable storage for the upload queue and document metadata

mod database;

pub use database::{DocumentQuery, IngestDb};
