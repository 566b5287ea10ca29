//! Shared application state handed to every handler.

use crate::services::analytics_service::AnalyticsService;
use crate::services::file_service::FileService;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub analytics: AnalyticsService,
    /// Directory uploads are written into before ingestion.
    pub upload_dir: PathBuf,
}
