//! FileService — ingestion and lifecycle of stored files.
//!
//! Ingestion composes metadata extraction with the repository insert and owns
//! the consistency guarantee: a record exists in the repository iff its file
//! exists on disk when `save_file` returns. The only window where a written
//! file could lack a record — the insert failing — is closed by a
//! compensating delete of the file.

use crate::models::file_record::FileRecord;
use crate::repository::file_repository::{FileRepository, StorageResult};
use crate::services::metadata_extractor::MetadataExtractor;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct FileService {
    pub repo: FileRepository,
}

impl FileService {
    pub fn new(repo: FileRepository) -> Self {
        Self { repo }
    }

    /// Ingest a file already written to `file_path`.
    ///
    /// Extraction cannot fail this call — analysis failures become the
    /// `Failed` metadata variant and the record is created regardless. If the
    /// repository insert fails, the file at `file_path` is removed
    /// (best effort) before the error propagates, so no orphaned file
    /// survives a failed ingestion.
    pub async fn save_file(
        &self,
        filename: &str,
        original_filename: &str,
        file_path: &str,
        mime_type: &str,
        size: i64,
    ) -> StorageResult<FileRecord> {
        let metadata = MetadataExtractor::extract(Path::new(file_path), mime_type).await;

        match self
            .repo
            .insert(filename, original_filename, mime_type, size, file_path, metadata)
            .await
        {
            Ok(record) => Ok(record),
            Err(err) => {
                // Compensating cleanup; a failure here leaves an orphaned
                // file, which is an accepted residual risk.
                if let Err(unlink_err) = fs::remove_file(file_path).await {
                    warn!(
                        path = file_path,
                        "failed to remove file after insert error: {unlink_err}"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn get_file(&self, id: Uuid) -> StorageResult<Option<FileRecord>> {
        self.repo.find_by_id(id).await
    }

    pub async fn list_files(&self, limit: i64, offset: i64) -> StorageResult<Vec<FileRecord>> {
        self.repo.find_all(limit, offset).await
    }

    /// Remove a file and its record. Returns false when the id is unknown.
    ///
    /// The filesystem removal is best effort — a missing or locked file must
    /// not block record cleanup. The repository delete's affected-row count
    /// decides `found`, so two concurrent deletes of one id cannot both
    /// return true.
    pub async fn delete_file(&self, id: Uuid) -> StorageResult<bool> {
        let Some(record) = self.repo.find_by_id(id).await? else {
            return Ok(false);
        };

        match fs::remove_file(&record.file_path).await {
            Ok(()) => debug!(path = %record.file_path, "removed stored file"),
            Err(err) => warn!(
                path = %record.file_path,
                "could not remove stored file: {err}"
            ),
        }

        self.repo.delete(id).await
    }

    /// Delete each id in input order. No atomicity across the batch: ids that
    /// fail lookup are skipped, earlier deletions stand. Returns how many ids
    /// were found and removed.
    pub async fn batch_delete(&self, ids: &[Uuid]) -> StorageResult<usize> {
        let mut deleted = 0;
        for &id in ids {
            if self.delete_file(id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
