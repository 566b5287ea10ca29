//! FileRepository — persistence for file records, backed by SQLite.
//!
//! This is the only module that touches the `files` table. Services receive a
//! repository instance explicitly instead of reaching for a process-wide pool,
//! so the read and write sides stay independently testable.

use crate::models::file_record::FileRecord;
use crate::models::metadata::{DOCUMENT_MIME, FileMetadata};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Aggregate row produced by [`FileRepository::aggregate`].
///
/// Categorical counts classify by the declared MIME type, not by the stored
/// metadata tag. `avg`/`max`/`min` are `None` for an empty table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatsRow {
    pub total_count: i64,
    pub total_size: i64,
    pub image_count: i64,
    pub document_count: i64,
    pub text_count: i64,
    pub avg_size: Option<f64>,
    pub max_size: Option<i64>,
    pub min_size: Option<i64>,
}

/// One duplicate group as it comes out of SQL; `ids` is the comma-joined
/// GROUP_CONCAT result, split and parsed by the analytics service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DuplicateRow {
    pub original_filename: String,
    pub size: i64,
    pub mime_type: String,
    pub duplicate_count: i64,
    pub ids: String,
}

const RECORD_COLUMNS: &str = "id, filename, original_filename, mime_type, size, \
     file_path, metadata, created_at, updated_at";

/// Repository over the shared SQLite pool.
#[derive(Clone)]
pub struct FileRepository {
    /// Shared connection pool; lifecycle owned by the bootstrap in `main`.
    pub db: Arc<SqlitePool>,
}

impl FileRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new record. The id and both timestamps are generated here;
    /// the returned record is the persisted row.
    pub async fn insert(
        &self,
        filename: &str,
        original_filename: &str,
        mime_type: &str,
        size: i64,
        file_path: &str,
        metadata: FileMetadata,
    ) -> StorageResult<FileRecord> {
        let record = FileRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            original_filename: original_filename.to_string(),
            mime_type: mime_type.to_string(),
            size,
            file_path: file_path.to_string(),
            metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO files (id, filename, original_filename, mime_type, size, \
             file_path, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.filename)
        .bind(&record.original_filename)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.file_path)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// Fetch records ordered by creation time, newest first.
    pub async fn find_all(&self, limit: i64, offset: i64) -> StorageResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM files
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    /// Delete a row. The affected-row count is the single source of truth for
    /// whether the id existed, so concurrent deletes of the same id cannot
    /// both report success.
    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Corpus-wide aggregate used by the statistics endpoint.
    pub async fn aggregate(&self) -> StorageResult<StatsRow> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS total_count,
                    COALESCE(SUM(size), 0) AS total_size,
                    COUNT(CASE WHEN mime_type LIKE 'image/%' THEN 1 END) AS image_count,
                    COUNT(CASE WHEN mime_type = ? THEN 1 END) AS document_count,
                    COUNT(CASE WHEN mime_type LIKE 'text/%' THEN 1 END) AS text_count,
                    AVG(size) AS avg_size,
                    MAX(size) AS max_size,
                    MIN(size) AS min_size
             FROM files",
        )
        .bind(DOCUMENT_MIME)
        .fetch_one(&*self.db)
        .await?;
        Ok(row)
    }

    /// Group records sharing the exact (original_filename, size, mime_type)
    /// triple. Only groups of two or more come back, largest first.
    pub async fn group_duplicates(&self) -> StorageResult<Vec<DuplicateRow>> {
        let rows = sqlx::query_as::<_, DuplicateRow>(
            "SELECT original_filename, size, mime_type,
                    COUNT(*) AS duplicate_count,
                    GROUP_CONCAT(id) AS ids
             FROM files
             GROUP BY original_filename, size, mime_type
             HAVING COUNT(*) > 1
             ORDER BY duplicate_count DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }
}
