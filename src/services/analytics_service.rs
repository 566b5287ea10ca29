//! AnalyticsService — read-side aggregation over the file corpus.

use crate::repository::file_repository::{FileRepository, StorageResult};
use serde::Serialize;
use uuid::Uuid;

/// Corpus-wide statistics. Counts classify by the declared MIME type of each
/// record; `avg`/`max`/`min` are null over an empty corpus.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatistics {
    pub total_count: i64,
    pub total_size: i64,
    pub image_count: i64,
    pub document_count: i64,
    pub text_count: i64,
    pub avg_size: Option<f64>,
    pub max_size: Option<i64>,
    pub min_size: Option<i64>,
}

/// Records sharing an identical (original_filename, size, mime_type) triple.
///
/// Advisory only — nothing stops true duplicates from being ingested; this
/// surfaces them after the fact.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub original_filename: String,
    pub size: i64,
    pub mime_type: String,
    pub count: i64,
    pub ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    pub repo: FileRepository,
}

impl AnalyticsService {
    pub fn new(repo: FileRepository) -> Self {
        Self { repo }
    }

    pub async fn statistics(&self) -> StorageResult<FileStatistics> {
        let row = self.repo.aggregate().await?;
        Ok(FileStatistics {
            total_count: row.total_count,
            total_size: row.total_size,
            image_count: row.image_count,
            document_count: row.document_count,
            text_count: row.text_count,
            avg_size: row.avg_size,
            max_size: row.max_size,
            min_size: row.min_size,
        })
    }

    /// Duplicate groups with two or more members, largest group first. Tie
    /// order between equal-sized groups follows store iteration order.
    pub async fn find_duplicates(&self) -> StorageResult<Vec<DuplicateGroup>> {
        let rows = self.repo.group_duplicates().await?;
        let groups = rows
            .into_iter()
            .map(|row| {
                let ids = row
                    .ids
                    .split(',')
                    .filter_map(|id| Uuid::parse_str(id).ok())
                    .collect();
                DuplicateGroup {
                    original_filename: row.original_filename,
                    size: row.size,
                    mime_type: row.mime_type,
                    count: row.duplicate_count,
                    ids,
                }
            })
            .collect();
        Ok(groups)
    }
}
