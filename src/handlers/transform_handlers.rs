//! HTTP handlers for image transformation and document text extraction.
//!
//! Each transform fetches the record, guards on the declared MIME type, runs
//! the transformer against the stored path, and sends the derived bytes back
//! as a download. Derived outputs are transient: the file is removed once its
//! bytes are taken, since only FileRecords are tracked entities.

use crate::errors::AppError;
use crate::handlers::file_handlers::attachment_header;
use crate::models::file_record::FileRecord;
use crate::models::metadata::DOCUMENT_MIME;
use crate::services::image_transformer::{FitMode, ImageTransformer};
use crate::services::pdf_text;
use crate::state::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path as UrlPath, State},
    http::{HeaderValue, header},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConvertReq {
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct CompressReq {
    pub quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ResizeReq {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CropReq {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// POST `/api/files/{id}/convert`
pub async fn convert_image(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
    Json(req): Json<ConvertReq>,
) -> Result<Response, AppError> {
    let record = fetch_image_record(&state, id).await?;
    let output = ImageTransformer::convert(
        Path::new(&record.file_path),
        &req.format,
        req.width,
        req.height,
        req.quality,
    )
    .await?;

    let download_name = format!(
        "{}.{}",
        file_stem(&record.original_filename),
        req.format.to_ascii_lowercase()
    );
    send_derived(&output, &download_name).await
}

/// POST `/api/files/{id}/compress`
pub async fn compress_image(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
    Json(req): Json<CompressReq>,
) -> Result<Response, AppError> {
    let record = fetch_image_record(&state, id).await?;
    let output = ImageTransformer::compress(Path::new(&record.file_path), req.quality).await?;

    let download_name = format!("compressed_{}", record.original_filename);
    send_derived(&output, &download_name).await
}

/// POST `/api/files/{id}/resize`
pub async fn resize_image(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
    Json(req): Json<ResizeReq>,
) -> Result<Response, AppError> {
    let record = fetch_image_record(&state, id).await?;
    let fit = match &req.fit {
        Some(raw) => FitMode::parse(raw).ok_or_else(|| {
            AppError::bad_request("fit must be one of: cover, contain, fill, inside, outside")
        })?,
        None => FitMode::default(),
    };

    let output =
        ImageTransformer::resize(Path::new(&record.file_path), req.width, req.height, fit).await?;

    let download_name = format!("resized_{}", record.original_filename);
    send_derived(&output, &download_name).await
}

/// POST `/api/files/{id}/crop`
pub async fn crop_image(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
    Json(req): Json<CropReq>,
) -> Result<Response, AppError> {
    let record = fetch_image_record(&state, id).await?;
    let output = ImageTransformer::crop(
        Path::new(&record.file_path),
        req.x,
        req.y,
        req.width,
        req.height,
    )
    .await?;

    let download_name = format!("cropped_{}", record.original_filename);
    send_derived(&output, &download_name).await
}

/// GET `/api/files/{id}/extract-text`
pub async fn extract_text(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = state
        .files
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    if record.mime_type != DOCUMENT_MIME {
        return Err(AppError::bad_request("File is not a PDF"));
    }

    let text = pdf_text::extract_text(Path::new(&record.file_path)).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "text": text,
            "filename": record.original_filename,
        },
    })))
}

async fn fetch_image_record(state: &AppState, id: Uuid) -> Result<FileRecord, AppError> {
    let record = state
        .files
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    if !record.mime_type.starts_with("image/") {
        return Err(AppError::bad_request("File is not an image"));
    }
    Ok(record)
}

/// Send a derived artifact as an attachment and remove it from disk; the
/// caller owns the bytes, nothing owns the file.
async fn send_derived(output: &Path, download_name: &str) -> Result<Response, AppError> {
    let bytes = fs::read(output)
        .await
        .map_err(|err| AppError::internal(format!("derived output unavailable: {err}")))?;
    if let Err(err) = fs::remove_file(output).await {
        tracing::debug!(path = %output.display(), "could not remove derived output: {err}");
    }

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_for_output(output)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_header(download_name),
    );
    Ok(response)
}

fn mime_for_output(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}
