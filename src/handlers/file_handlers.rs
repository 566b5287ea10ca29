//! HTTP handlers for upload, listing, download, deletion, and analytics.
//!
//! These are plumbing: multipart parsing, id extraction, and response
//! shaping. Everything with behavior lives in the services.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteReq {
    pub ids: Vec<Uuid>,
}

/// POST `/api/files/upload` — multipart upload, field name `file`.
///
/// The payload is streamed to disk first; `FileService::save_file` then owns
/// the file-vs-record consistency from that point on.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let stored_name = stored_filename(&original_filename);
        let stored_path = state.upload_dir.join(&stored_name);
        let size = write_field_to_disk(field, &stored_path).await?;

        let stored_path_str = stored_path
            .to_str()
            .ok_or_else(|| AppError::internal("upload path is not valid UTF-8"))?;
        let record = state
            .files
            .save_file(
                &stored_name,
                &original_filename,
                stored_path_str,
                &mime_type,
                size,
            )
            .await?;

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "data": record,
                "message": "File uploaded and analyzed successfully",
            })),
        ));
    }

    Err(AppError::bad_request("No file uploaded"))
}

/// GET `/api/files` — newest first, `?limit=&offset=`.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);

    let files = state.files.list_files(limit, offset).await?;
    Ok(Json(json!({
        "success": true,
        "count": files.len(),
        "data": files,
    })))
}

/// GET `/api/files/{id}`
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .files
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;
    Ok(Json(json!({ "success": true, "data": record })))
}

/// GET `/api/files/{id}/download` — streams the stored payload.
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = state
        .files
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    let file = fs::File::open(&record.file_path)
        .await
        .map_err(|err| AppError::internal(format!("stored file unavailable: {err}")))?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_header(&record.original_filename),
    );
    Ok(response)
}

/// DELETE `/api/files/{id}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.files.delete_file(id).await? {
        return Err(AppError::not_found("File not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
    })))
}

/// POST `/api/files/batch/delete` — `{ "ids": [...] }`, processed in order,
/// no atomicity across the batch.
pub async fn batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.ids.is_empty() {
        return Err(AppError::bad_request("ids must be a non-empty array"));
    }

    let deleted = state.files.batch_delete(&req.ids).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {deleted} file(s)"),
        "deletedCount": deleted,
    })))
}

/// GET `/api/files/stats/summary`
pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = state.analytics.statistics().await?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

/// GET `/api/files/duplicates`
pub async fn find_duplicates(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let duplicates = state.analytics.find_duplicates().await?;
    Ok(Json(json!({ "success": true, "data": duplicates })))
}

/// Disk name for an upload: fresh UUID plus the original extension when it
/// looks sane. Collisions are not a concern; traversal via the extension is.
fn stored_filename(original: &str) -> String {
    let ext = std::path::Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}

/// Stream one multipart field to `path`, returning the byte count. Partial
/// writes are removed before the error is surfaced.
async fn write_field_to_disk(mut field: Field<'_>, path: &std::path::Path) -> Result<i64, AppError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|err| AppError::internal(err.to_string()))?;
    let mut size: i64 = 0;

    while let Some(chunk_res) = field.next().await {
        let chunk: Bytes = match chunk_res {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = fs::remove_file(path).await;
                return Err(AppError::bad_request(err.to_string()));
            }
        };
        size += chunk.len() as i64;
        if let Err(err) = file.write_all(&chunk).await {
            let _ = fs::remove_file(path).await;
            return Err(AppError::internal(err.to_string()));
        }
    }

    if let Err(err) = file.flush().await {
        let _ = fs::remove_file(path).await;
        return Err(AppError::internal(err.to_string()));
    }
    Ok(size)
}

pub(crate) fn attachment_header(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_filename_keeps_simple_extensions() {
        let name = stored_filename("holiday photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 36 + 4);
    }

    #[test]
    fn stored_filename_drops_suspicious_extensions() {
        assert_eq!(stored_filename("noext").len(), 36);
        assert_eq!(stored_filename("weird.ex$t").len(), 36);
        assert_eq!(
            stored_filename("x.waaaaaaaaaaaaaaytoolongext").len(),
            36
        );
    }

    #[test]
    fn attachment_header_escapes_quotes() {
        let value = attachment_header("a\"b.txt");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"a_b.txt\"");
    }
}
