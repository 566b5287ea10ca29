//! Defines routes for all file and analytics operations.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `POST   /api/files/upload` — multipart upload (field `file`)
//!   - `GET    /api/files` — list records (supports limit, offset)
//!   - `GET    /api/files/stats/summary` — corpus statistics
//!   - `GET    /api/files/duplicates` — duplicate groups
//!   - `POST   /api/files/batch/delete` — delete a list of ids
//!
//! - **Record endpoints**
//!   - `GET    /api/files/{id}` — fetch one record
//!   - `GET    /api/files/{id}/download` — stream the stored payload
//!   - `DELETE /api/files/{id}` — delete record and payload
//!   - `POST   /api/files/{id}/convert|compress|resize|crop` — derived images
//!   - `GET    /api/files/{id}/extract-text` — PDF text layer

use crate::handlers::{
    file_handlers::{
        batch_delete, delete_file, download_file, find_duplicates, get_file, list_files,
        statistics, upload_file,
    },
    health_handlers::{healthz, readyz},
    transform_handlers::{compress_image, convert_image, crop_image, extract_text, resize_image},
};
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Upload size cap, matching the original service's limit.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Build and return the router for the whole API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // collection-level routes
        .route("/api/files/upload", post(upload_file))
        .route("/api/files", get(list_files))
        .route("/api/files/stats/summary", get(statistics))
        .route("/api/files/duplicates", get(find_duplicates))
        .route("/api/files/batch/delete", post(batch_delete))
        // record-level routes
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/{id}/download", get(download_file))
        .route("/api/files/{id}/convert", post(convert_image))
        .route("/api/files/{id}/compress", post(compress_image))
        .route("/api/files/{id}/resize", post(resize_image))
        .route("/api/files/{id}/crop", post(crop_image))
        .route("/api/files/{id}/extract-text", get(extract_text))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
