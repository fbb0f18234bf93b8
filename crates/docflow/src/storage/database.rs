//! SQLite persistence for the upload queue and document metadata
//!
//! Two durable collections back the ingestion flow: `upload_queue` holds
//! documents awaiting processing in strict position order, and
//! `document_metadata` is the source of truth for every document that has
//! left the queue. All access goes through a single connection guarded by a
//! mutex, which also serializes queue position assignment.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    DocumentMetadata, ProcessingStatus, ProcessingStep, QueueItem, QueueItemStatus, QueueStats,
};

/// Error messages persisted on failed documents are capped at this many
/// characters.
const MAX_ERROR_CHARS: usize = 500;

/// SQLite-backed ingestion database
pub struct IngestDb {
    conn: Arc<Mutex<Connection>>,
}

impl IngestDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Internal(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        // WAL keeps readers responsive while the processor writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::Internal(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            -- Upload queue: documents admitted but not yet processed
            CREATE TABLE IF NOT EXISTS upload_queue (
                queue_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                category TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size_bytes INTEGER NOT NULL,
                uploader_id TEXT NOT NULL,
                uploader_name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                position INTEGER NOT NULL,
                added_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                processing_progress INTEGER,
                processing_step TEXT,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_upload_queue_position ON upload_queue(position);
            CREATE INDEX IF NOT EXISTS idx_upload_queue_status ON upload_queue(status);

            -- Document metadata: lifecycle record once processing begins
            CREATE TABLE IF NOT EXISTS document_metadata (
                document_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                category TEXT NOT NULL,
                uploader_id TEXT NOT NULL,
                uploader_name TEXT NOT NULL,
                upload_date TEXT NOT NULL,
                file_size_bytes INTEGER NOT NULL,
                file_extension TEXT NOT NULL DEFAULT '',
                processing_status TEXT NOT NULL,
                processing_step TEXT,
                processing_progress INTEGER NOT NULL DEFAULT 0,
                chunk_count INTEGER,
                error_message TEXT,
                processing_time_seconds REAL,
                deleted INTEGER NOT NULL DEFAULT 0,
                deleted_by TEXT,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_document_metadata_status ON document_metadata(processing_status);
            CREATE INDEX IF NOT EXISTS idx_document_metadata_deleted ON document_metadata(deleted);
            CREATE INDEX IF NOT EXISTS idx_document_metadata_upload_date ON document_metadata(upload_date);
        "#,
        )
        .map_err(|e| Error::Internal(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ==================== Upload Queue Operations ====================

    /// Append a document to the queue at the next available position.
    /// Position assignment is serialized by the connection lock, so
    /// concurrent uploads cannot collide.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        document_id: Uuid,
        filename: &str,
        category: &str,
        file_path: &str,
        file_size_bytes: u64,
        uploader_id: &str,
        uploader_name: &str,
    ) -> Result<QueueItem> {
        let conn = self.conn.lock();

        let max_position: i64 = conn
            .query_row("SELECT COALESCE(MAX(position), 0) FROM upload_queue", [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Internal(format!("Failed to read queue positions: {}", e)))?;

        let item = QueueItem {
            queue_id: QueueItem::queue_id_for(&document_id),
            document_id,
            filename: filename.to_string(),
            category: category.to_string(),
            file_path: file_path.to_string(),
            file_size_bytes,
            uploader_id: uploader_id.to_string(),
            uploader_name: uploader_name.to_string(),
            status: QueueItemStatus::Pending,
            position: max_position + 1,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
            processing_progress: None,
            processing_step: None,
            error_message: None,
        };

        conn.execute(
            r#"
            INSERT INTO upload_queue (
                queue_id, document_id, filename, category, file_path,
                file_size_bytes, uploader_id, uploader_name, status, position, added_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                item.queue_id,
                item.document_id.to_string(),
                item.filename,
                item.category,
                item.file_path,
                item.file_size_bytes as i64,
                item.uploader_id,
                item.uploader_name,
                queue_status_to_string(&item.status),
                item.position,
                item.added_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Internal(format!("Failed to enqueue document: {}", e)))?;

        Ok(item)
    }

    /// All queue items sorted ascending by position
    pub fn list_queue(&self) -> Result<Vec<QueueItem>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM upload_queue ORDER BY position ASC")
            .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

        let items = stmt
            .query_map([], row_to_queue_item)
            .map_err(|e| Error::Internal(format!("Failed to list queue: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(items)
    }

    /// Get a queue item by its queue ID
    pub fn get_queue_item(&self, queue_id: &str) -> Result<Option<QueueItem>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM upload_queue WHERE queue_id = ?1")
            .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

        let item = stmt
            .query_row(params![queue_id], row_to_queue_item)
            .optional()
            .map_err(|e| Error::Internal(format!("Failed to get queue item: {}", e)))?;

        Ok(item)
    }

    /// The lowest-position pending item, if any
    pub fn next_pending(&self) -> Result<Option<QueueItem>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM upload_queue WHERE status = 'pending' ORDER BY position ASC LIMIT 1")
            .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

        let item = stmt
            .query_row([], row_to_queue_item)
            .optional()
            .map_err(|e| Error::Internal(format!("Failed to find next pending item: {}", e)))?;

        Ok(item)
    }

    /// Remove an item and renumber the remaining positions as a dense 1..N
    /// sequence. Returns false if the item did not exist.
    pub fn remove_from_queue(&self, queue_id: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let removed = conn
            .execute("DELETE FROM upload_queue WHERE queue_id = ?1", params![queue_id])
            .map_err(|e| Error::Internal(format!("Failed to remove queue item: {}", e)))?;

        if removed == 0 {
            return Ok(false);
        }

        renumber_positions(&conn)?;
        Ok(true)
    }

    /// Aggregate queue statistics. Pending comes from the queue; the other
    /// states come from document metadata, since those documents have
    /// already left the queue.
    pub fn stats(&self) -> Result<QueueStats> {
        let conn = self.conn.lock();

        let pending: i64 = conn
            .query_row("SELECT COUNT(*) FROM upload_queue WHERE status = 'pending'", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        let processing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM document_metadata WHERE processing_status = 'processing' AND deleted = 0",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let completed: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM document_metadata WHERE processing_status = 'completed' AND deleted = 0",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let failed: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM document_metadata WHERE processing_status = 'failed' AND deleted = 0",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(QueueStats {
            total: (pending + processing + completed + failed) as u64,
            pending: pending as u64,
            processing: processing as u64,
            completed: completed as u64,
            failed: failed as u64,
        })
    }

    // ==================== Document Metadata Operations ====================

    /// Insert the lifecycle record for a document entering the pipeline
    pub fn insert_metadata(&self, meta: &DocumentMetadata) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO document_metadata (
                document_id, filename, category, uploader_id, uploader_name,
                upload_date, file_size_bytes, file_extension, processing_status,
                processing_step, processing_progress, chunk_count, error_message,
                processing_time_seconds, deleted, deleted_by, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                meta.document_id.to_string(),
                meta.filename,
                meta.category,
                meta.uploader_id,
                meta.uploader_name,
                meta.upload_date.to_rfc3339(),
                meta.file_size_bytes as i64,
                meta.file_extension,
                processing_status_to_string(&meta.processing_status),
                meta.processing_step,
                meta.processing_progress,
                meta.chunk_count,
                meta.error_message,
                meta.processing_time_seconds,
                meta.deleted as i64,
                meta.deleted_by,
                meta.deleted_at.map(|d| d.to_rfc3339()),
            ],
        )
        .map_err(|e| Error::Internal(format!("Failed to insert document metadata: {}", e)))?;

        Ok(())
    }

    /// Get a document's metadata record, deleted or not
    pub fn get_metadata(&self, document_id: &Uuid) -> Result<Option<DocumentMetadata>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT * FROM document_metadata WHERE document_id = ?1")
            .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

        let meta = stmt
            .query_row(params![document_id.to_string()], row_to_document_metadata)
            .optional()
            .map_err(|e| Error::Internal(format!("Failed to get document metadata: {}", e)))?;

        Ok(meta)
    }

    /// Record the pipeline stage a document has reached
    pub fn update_stage(&self, document_id: &Uuid, step: ProcessingStep, progress: u8) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE document_metadata SET processing_step = ?1, processing_progress = ?2 WHERE document_id = ?3",
            params![step.as_str(), progress, document_id.to_string()],
        )
        .map_err(|e| Error::Internal(format!("Failed to update processing stage: {}", e)))?;

        Ok(())
    }

    /// Update only the progress value, leaving the step label untouched.
    /// Used by the extraction heartbeat.
    pub fn update_progress(&self, document_id: &Uuid, progress: u8) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE document_metadata SET processing_progress = ?1 WHERE document_id = ?2",
            params![progress, document_id.to_string()],
        )
        .map_err(|e| Error::Internal(format!("Failed to update processing progress: {}", e)))?;

        Ok(())
    }

    /// Record terminal success. The step label keeps its last stage value.
    pub fn mark_completed(
        &self,
        document_id: &Uuid,
        chunk_count: u32,
        processing_time_seconds: f64,
    ) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            UPDATE document_metadata
            SET processing_status = 'completed', processing_progress = 100,
                chunk_count = ?1, processing_time_seconds = ?2
            WHERE document_id = ?3
            "#,
            params![chunk_count, processing_time_seconds, document_id.to_string()],
        )
        .map_err(|e| Error::Internal(format!("Failed to mark document completed: {}", e)))?;

        Ok(())
    }

    /// Record terminal failure. The message is capped at 500 characters.
    pub fn mark_failed(
        &self,
        document_id: &Uuid,
        error: &str,
        processing_time_seconds: Option<f64>,
    ) -> Result<()> {
        let message: String = error.chars().take(MAX_ERROR_CHARS).collect();
        let conn = self.conn.lock();

        conn.execute(
            r#"
            UPDATE document_metadata
            SET processing_status = 'failed', error_message = ?1,
                processing_time_seconds = COALESCE(?2, processing_time_seconds)
            WHERE document_id = ?3
            "#,
            params![message, processing_time_seconds, document_id.to_string()],
        )
        .map_err(|e| Error::Internal(format!("Failed to mark document failed: {}", e)))?;

        Ok(())
    }

    /// List non-deleted documents, newest first
    pub fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentMetadata>> {
        let conn = self.conn.lock();

        let (where_clause, mut owned) = document_filter_sql(query);
        let sql = format!(
            "SELECT * FROM document_metadata {} ORDER BY upload_date DESC LIMIT ? OFFSET ?",
            where_clause
        );
        owned.push(Box::new(query.limit));
        owned.push(Box::new(query.offset));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = owned.iter().map(|p| p.as_ref()).collect();
        let records = stmt
            .query_map(&param_refs[..], row_to_document_metadata)
            .map_err(|e| Error::Internal(format!("Failed to list documents: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Count the documents a filter matches, ignoring paging
    pub fn count_documents(&self, query: &DocumentQuery) -> Result<u64> {
        let conn = self.conn.lock();

        let (where_clause, owned) = document_filter_sql(query);
        let sql = format!("SELECT COUNT(*) FROM document_metadata {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = owned.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn
            .query_row(&sql, &param_refs[..], |row| row.get(0))
            .map_err(|e| Error::Internal(format!("Failed to count documents: {}", e)))?;

        Ok(count as u64)
    }

    /// Soft-delete a document, recording who deleted it and when
    pub fn soft_delete_document(&self, document_id: &Uuid, deleted_by: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let updated = conn
            .execute(
                "UPDATE document_metadata SET deleted = 1, deleted_by = ?1, deleted_at = ?2 WHERE document_id = ?3 AND deleted = 0",
                params![deleted_by, Utc::now().to_rfc3339(), document_id.to_string()],
            )
            .map_err(|e| Error::Internal(format!("Failed to soft-delete document: {}", e)))?;

        Ok(updated > 0)
    }

    /// Remove a document's metadata row entirely
    pub fn delete_metadata(&self, document_id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();

        let removed = conn
            .execute(
                "DELETE FROM document_metadata WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| Error::Internal(format!("Failed to delete document metadata: {}", e)))?;

        Ok(removed > 0)
    }

    /// Force stale processing/uploading documents to failed with the given
    /// message. Returns the number of repaired records.
    pub fn recover_stale_documents(&self, cutoff: DateTime<Utc>, message: &str) -> Result<usize> {
        let conn = self.conn.lock();

        let updated = conn
            .execute(
                r#"
                UPDATE document_metadata
                SET processing_status = 'failed', error_message = ?1
                WHERE processing_status IN ('processing', 'uploading')
                  AND upload_date < ?2
                "#,
                params![message, cutoff.to_rfc3339()],
            )
            .map_err(|e| Error::Internal(format!("Failed to recover stale documents: {}", e)))?;

        Ok(updated)
    }

    /// Health probe used by the readiness endpoint
    pub fn health_check(&self) -> Result<bool> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Internal(format!("Database health check failed: {}", e)))?;
        Ok(true)
    }
}

/// Filters for document listing
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub category: Option<String>,
    pub uploader_id: Option<String>,
    /// Substring match on the filename
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        Self {
            category: None,
            uploader_id: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

fn document_filter_sql(query: &DocumentQuery) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut clause = String::from("WHERE deleted = 0");
    let mut owned: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(category) = &query.category {
        clause.push_str(" AND category = ?");
        owned.push(Box::new(category.clone()));
    }
    if let Some(uploader_id) = &query.uploader_id {
        clause.push_str(" AND uploader_id = ?");
        owned.push(Box::new(uploader_id.clone()));
    }
    if let Some(search) = &query.search {
        clause.push_str(" AND filename LIKE ? ESCAPE '\\'");
        let escaped = search
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        owned.push(Box::new(format!("%{}%", escaped)));
    }

    (clause, owned)
}

/// Reassign positions as a dense 1..N sequence, preserving relative order.
/// Only rows whose position actually changes are written.
fn renumber_positions(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT queue_id FROM upload_queue ORDER BY position ASC")
        .map_err(|e| Error::Internal(format!("Failed to prepare query: {}", e)))?;

    let ids: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| Error::Internal(format!("Failed to read queue order: {}", e)))?
        .filter_map(|r| r.ok())
        .collect();

    for (idx, queue_id) in ids.iter().enumerate() {
        let position = (idx + 1) as i64;
        conn.execute(
            "UPDATE upload_queue SET position = ?1 WHERE queue_id = ?2 AND position != ?1",
            params![position, queue_id],
        )
        .map_err(|e| Error::Internal(format!("Failed to renumber queue: {}", e)))?;
    }

    Ok(())
}

fn queue_status_to_string(status: &QueueItemStatus) -> &'static str {
    match status {
        QueueItemStatus::Pending => "pending",
        QueueItemStatus::Processing => "processing",
        QueueItemStatus::Completed => "completed",
        QueueItemStatus::Failed => "failed",
    }
}

fn string_to_queue_status(s: &str) -> QueueItemStatus {
    match s {
        "pending" => QueueItemStatus::Pending,
        "processing" => QueueItemStatus::Processing,
        "completed" => QueueItemStatus::Completed,
        "failed" => QueueItemStatus::Failed,
        _ => QueueItemStatus::Pending,
    }
}

fn processing_status_to_string(status: &ProcessingStatus) -> &'static str {
    match status {
        ProcessingStatus::Uploading => "uploading",
        ProcessingStatus::Processing => "processing",
        ProcessingStatus::Completed => "completed",
        ProcessingStatus::Failed => "failed",
    }
}

fn string_to_processing_status(s: &str) -> ProcessingStatus {
    match s {
        "uploading" => ProcessingStatus::Uploading,
        "processing" => ProcessingStatus::Processing,
        "completed" => ProcessingStatus::Completed,
        "failed" => ProcessingStatus::Failed,
        _ => ProcessingStatus::Failed,
    }
}

fn row_to_queue_item(row: &rusqlite::Row) -> rusqlite::Result<QueueItem> {
    let queue_id: String = row.get(0)?;
    let document_id_str: String = row.get(1)?;
    let filename: String = row.get(2)?;
    let category: String = row.get(3)?;
    let file_path: String = row.get(4)?;
    let file_size_bytes: i64 = row.get(5)?;
    let uploader_id: String = row.get(6)?;
    let uploader_name: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let position: i64 = row.get(9)?;
    let added_at_str: String = row.get(10)?;
    let started_at_str: Option<String> = row.get(11)?;
    let completed_at_str: Option<String> = row.get(12)?;
    let processing_progress: Option<i64> = row.get(13)?;
    let processing_step: Option<String> = row.get(14)?;
    let error_message: Option<String> = row.get(15)?;

    Ok(QueueItem {
        queue_id,
        document_id: Uuid::parse_str(&document_id_str).unwrap_or_else(|_| Uuid::new_v4()),
        filename,
        category,
        file_path,
        file_size_bytes: file_size_bytes as u64,
        uploader_id,
        uploader_name,
        status: string_to_queue_status(&status_str),
        position,
        added_at: DateTime::parse_from_rfc3339(&added_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        started_at: started_at_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
        }),
        completed_at: completed_at_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
        }),
        processing_progress: processing_progress.map(|p| p as u8),
        processing_step,
        error_message,
    })
}

fn row_to_document_metadata(row: &rusqlite::Row) -> rusqlite::Result<DocumentMetadata> {
    let document_id_str: String = row.get(0)?;
    let filename: String = row.get(1)?;
    let category: String = row.get(2)?;
    let uploader_id: String = row.get(3)?;
    let uploader_name: String = row.get(4)?;
    let upload_date_str: String = row.get(5)?;
    let file_size_bytes: i64 = row.get(6)?;
    let file_extension: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let processing_step: Option<String> = row.get(9)?;
    let processing_progress: i64 = row.get(10)?;
    let chunk_count: Option<i64> = row.get(11)?;
    let error_message: Option<String> = row.get(12)?;
    let processing_time_seconds: Option<f64> = row.get(13)?;
    let deleted: i64 = row.get(14)?;
    let deleted_by: Option<String> = row.get(15)?;
    let deleted_at_str: Option<String> = row.get(16)?;

    Ok(DocumentMetadata {
        document_id: Uuid::parse_str(&document_id_str).unwrap_or_else(|_| Uuid::new_v4()),
        filename,
        category,
        uploader_id,
        uploader_name,
        upload_date: DateTime::parse_from_rfc3339(&upload_date_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        file_size_bytes: file_size_bytes as u64,
        file_extension,
        processing_status: string_to_processing_status(&status_str),
        processing_step,
        processing_progress: processing_progress as u8,
        chunk_count: chunk_count.map(|c| c as u32),
        error_message,
        processing_time_seconds,
        deleted: deleted != 0,
        deleted_by,
        deleted_at: deleted_at_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn enqueue_simple(db: &IngestDb, name: &str) -> QueueItem {
        db.enqueue(
            Uuid::new_v4(),
            name,
            "general",
            &format!("/tmp/{}", name),
            1000,
            "user-1",
            "User One",
        )
        .unwrap()
    }

    fn metadata_with_status(status: ProcessingStatus, age: Duration) -> DocumentMetadata {
        DocumentMetadata {
            document_id: Uuid::new_v4(),
            filename: "doc.pdf".to_string(),
            category: "general".to_string(),
            uploader_id: "user-1".to_string(),
            uploader_name: "User One".to_string(),
            upload_date: Utc::now() - age,
            file_size_bytes: 1000,
            file_extension: "pdf".to_string(),
            processing_status: status,
            processing_step: None,
            processing_progress: 0,
            chunk_count: None,
            error_message: None,
            processing_time_seconds: None,
            deleted: false,
            deleted_by: None,
            deleted_at: None,
        }
    }

    #[test]
    fn enqueue_assigns_sequential_positions() {
        let db = IngestDb::in_memory().unwrap();

        let a = enqueue_simple(&db, "a.pdf");
        let b = enqueue_simple(&db, "b.pdf");
        let c = enqueue_simple(&db, "c.pdf");

        assert_eq!((a.position, b.position, c.position), (1, 2, 3));

        let listed = db.list_queue().unwrap();
        let names: Vec<&str> = listed.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn remove_renumbers_remaining_items() {
        let db = IngestDb::in_memory().unwrap();

        let a = enqueue_simple(&db, "a.pdf");
        let b = enqueue_simple(&db, "b.pdf");
        let c = enqueue_simple(&db, "c.pdf");

        assert!(db.remove_from_queue(&b.queue_id).unwrap());

        let listed = db.list_queue().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].queue_id, a.queue_id);
        assert_eq!(listed[0].position, 1);
        assert_eq!(listed[1].queue_id, c.queue_id);
        assert_eq!(listed[1].position, 2);
    }

    #[test]
    fn remove_missing_item_returns_false() {
        let db = IngestDb::in_memory().unwrap();
        assert!(!db.remove_from_queue("queue_does-not-exist").unwrap());
    }

    #[test]
    fn next_pending_respects_position_order() {
        let db = IngestDb::in_memory().unwrap();

        let first = enqueue_simple(&db, "first.pdf");
        enqueue_simple(&db, "second.pdf");

        let next = db.next_pending().unwrap().unwrap();
        assert_eq!(next.queue_id, first.queue_id);

        db.remove_from_queue(&first.queue_id).unwrap();
        let next = db.next_pending().unwrap().unwrap();
        assert_eq!(next.filename, "second.pdf");
    }

    #[test]
    fn metadata_roundtrip() {
        let db = IngestDb::in_memory().unwrap();
        let meta = metadata_with_status(ProcessingStatus::Processing, Duration::zero());

        db.insert_metadata(&meta).unwrap();
        let loaded = db.get_metadata(&meta.document_id).unwrap().unwrap();

        assert_eq!(loaded.document_id, meta.document_id);
        assert_eq!(loaded.processing_status, ProcessingStatus::Processing);
        assert_eq!(loaded.file_extension, "pdf");
        assert!(!loaded.deleted);
    }

    #[test]
    fn stage_updates_and_completion() {
        let db = IngestDb::in_memory().unwrap();
        let meta = metadata_with_status(ProcessingStatus::Processing, Duration::zero());
        db.insert_metadata(&meta).unwrap();

        db.update_stage(&meta.document_id, ProcessingStep::Chunking, 30).unwrap();
        let loaded = db.get_metadata(&meta.document_id).unwrap().unwrap();
        assert_eq!(loaded.processing_step.as_deref(), Some("chunking"));
        assert_eq!(loaded.processing_progress, 30);

        db.update_stage(&meta.document_id, ProcessingStep::StoringVectors, 80).unwrap();
        db.mark_completed(&meta.document_id, 12, 4.27).unwrap();

        let loaded = db.get_metadata(&meta.document_id).unwrap().unwrap();
        assert_eq!(loaded.processing_status, ProcessingStatus::Completed);
        assert_eq!(loaded.processing_progress, 100);
        assert_eq!(loaded.chunk_count, Some(12));
        assert_eq!(loaded.processing_time_seconds, Some(4.27));
        // Completion does not rewrite the step label
        assert_eq!(loaded.processing_step.as_deref(), Some("storing_vectors"));
    }

    #[test]
    fn mark_failed_truncates_long_messages() {
        let db = IngestDb::in_memory().unwrap();
        let meta = metadata_with_status(ProcessingStatus::Processing, Duration::zero());
        db.insert_metadata(&meta).unwrap();

        let long_error = "x".repeat(2000);
        db.mark_failed(&meta.document_id, &long_error, Some(1.5)).unwrap();

        let loaded = db.get_metadata(&meta.document_id).unwrap().unwrap();
        assert_eq!(loaded.processing_status, ProcessingStatus::Failed);
        assert_eq!(loaded.error_message.unwrap().chars().count(), 500);
        assert_eq!(loaded.processing_time_seconds, Some(1.5));
    }

    #[test]
    fn stats_combine_queue_and_metadata() {
        let db = IngestDb::in_memory().unwrap();

        enqueue_simple(&db, "p1.pdf");
        enqueue_simple(&db, "p2.pdf");
        db.insert_metadata(&metadata_with_status(ProcessingStatus::Processing, Duration::zero()))
            .unwrap();
        db.insert_metadata(&metadata_with_status(ProcessingStatus::Completed, Duration::zero()))
            .unwrap();
        db.insert_metadata(&metadata_with_status(ProcessingStatus::Failed, Duration::zero()))
            .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(
            stats,
            QueueStats {
                total: 5,
                pending: 2,
                processing: 1,
                completed: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn stats_ignore_soft_deleted_documents() {
        let db = IngestDb::in_memory().unwrap();

        let meta = metadata_with_status(ProcessingStatus::Completed, Duration::zero());
        db.insert_metadata(&meta).unwrap();
        db.soft_delete_document(&meta.document_id, "admin").unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn recovery_only_touches_stale_records() {
        let db = IngestDb::in_memory().unwrap();

        let stale = metadata_with_status(ProcessingStatus::Processing, Duration::minutes(45));
        let fresh = metadata_with_status(ProcessingStatus::Processing, Duration::minutes(5));
        let done = metadata_with_status(ProcessingStatus::Completed, Duration::minutes(90));
        db.insert_metadata(&stale).unwrap();
        db.insert_metadata(&fresh).unwrap();
        db.insert_metadata(&done).unwrap();

        let cutoff = Utc::now() - Duration::minutes(30);
        let repaired = db
            .recover_stale_documents(cutoff, "Processing interrupted by server restart.")
            .unwrap();
        assert_eq!(repaired, 1);

        let stale_after = db.get_metadata(&stale.document_id).unwrap().unwrap();
        assert_eq!(stale_after.processing_status, ProcessingStatus::Failed);
        assert!(stale_after.error_message.unwrap().contains("interrupted"));

        let fresh_after = db.get_metadata(&fresh.document_id).unwrap().unwrap();
        assert_eq!(fresh_after.processing_status, ProcessingStatus::Processing);

        let done_after = db.get_metadata(&done.document_id).unwrap().unwrap();
        assert_eq!(done_after.processing_status, ProcessingStatus::Completed);
    }

    #[test]
    fn soft_delete_hides_from_listing() {
        let db = IngestDb::in_memory().unwrap();

        let keep = metadata_with_status(ProcessingStatus::Completed, Duration::zero());
        let gone = metadata_with_status(ProcessingStatus::Completed, Duration::zero());
        db.insert_metadata(&keep).unwrap();
        db.insert_metadata(&gone).unwrap();

        assert!(db.soft_delete_document(&gone.document_id, "admin").unwrap());
        // A second soft delete is a no-op
        assert!(!db.soft_delete_document(&gone.document_id, "admin").unwrap());

        let listed = db.list_documents(&DocumentQuery::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].document_id, keep.document_id);

        // The row still exists and carries the audit fields
        let loaded = db.get_metadata(&gone.document_id).unwrap().unwrap();
        assert!(loaded.deleted);
        assert_eq!(loaded.deleted_by.as_deref(), Some("admin"));
        assert!(loaded.deleted_at.is_some());
    }

    #[test]
    fn list_documents_filters_and_sorts() {
        let db = IngestDb::in_memory().unwrap();

        let mut older = metadata_with_status(ProcessingStatus::Completed, Duration::minutes(10));
        older.filename = "manual_v1.pdf".to_string();
        older.category = "manuals".to_string();
        let mut newer = metadata_with_status(ProcessingStatus::Completed, Duration::zero());
        newer.filename = "manual_v2.pdf".to_string();
        newer.category = "manuals".to_string();
        let mut other = metadata_with_status(ProcessingStatus::Completed, Duration::minutes(5));
        other.filename = "invoice.pdf".to_string();
        other.category = "finance".to_string();

        db.insert_metadata(&older).unwrap();
        db.insert_metadata(&newer).unwrap();
        db.insert_metadata(&other).unwrap();

        let query = DocumentQuery {
            category: Some("manuals".to_string()),
            search: Some("manual".to_string()),
            ..Default::default()
        };
        let listed = db.list_documents(&query).unwrap();
        assert_eq!(listed.len(), 2);
        // Newest first
        assert_eq!(listed[0].filename, "manual_v2.pdf");
        assert_eq!(listed[1].filename, "manual_v1.pdf");

        assert_eq!(db.count_documents(&query).unwrap(), 2);
        assert_eq!(db.count_documents(&DocumentQuery::default()).unwrap(), 3);
    }
}
