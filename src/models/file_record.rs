//! Represents a file tracked by the repository.

use crate::models::metadata::FileMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// A single ingested file.
///
/// The record describes a file on disk together with its extracted metadata.
/// Records are created once at ingestion and never mutated afterwards; the
/// only state change a record can undergo is deletion.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FileRecord {
    /// Internal UUID, generated when the record is persisted.
    pub id: Uuid,

    /// Name the file is stored under on disk.
    pub filename: String,

    /// Name the client uploaded the file as.
    pub original_filename: String,

    /// Caller-declared MIME type, kept verbatim even when byte sniffing
    /// disagrees (the sniffed type lives inside generic metadata).
    pub mime_type: String,

    /// Size in bytes as reported at upload time.
    pub size: i64,

    /// Location of the payload on disk.
    pub file_path: String,

    /// Extracted metadata, one tagged variant per record.
    pub metadata: FileMetadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Ids are persisted as hyphenated TEXT so SQL-side grouping (GROUP_CONCAT in
// the duplicates query) yields parseable strings, and metadata as a JSON
// column; both need a hand-written row mapping.
impl FromRow<'_, SqliteRow> for FileRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let id = Uuid::parse_str(&id).map_err(|err| sqlx::Error::ColumnDecode {
            index: "id".into(),
            source: Box::new(err),
        })?;
        let Json(metadata): Json<FileMetadata> = row.try_get("metadata")?;

        Ok(FileRecord {
            id,
            filename: row.try_get("filename")?,
            original_filename: row.try_get("original_filename")?,
            mime_type: row.try_get("mime_type")?,
            size: row.try_get("size")?,
            file_path: row.try_get("file_path")?,
            metadata,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
