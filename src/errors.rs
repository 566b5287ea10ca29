use crate::repository::file_repository::StorageError;
use crate::services::image_transformer::TransformError;
use crate::services::pdf_text::TextExtractError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Repository/filesystem faults are internal; nothing the caller sent caused
/// them.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Transform failures keep their kind visible in the status: parameter
/// problems are the caller's to fix, codec failures are not.
impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        let status = match &err {
            TransformError::UnsupportedFormat(_)
            | TransformError::InvalidCrop { .. }
            | TransformError::OutOfBounds { .. } => StatusCode::BAD_REQUEST,
            TransformError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TransformError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<TextExtractError> for AppError {
    fn from(err: TextExtractError) -> Self {
        let status = match &err {
            TextExtractError::CapabilityUnavailable => StatusCode::NOT_IMPLEMENTED,
            TextExtractError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        AppError::new(status, err.to_string())
    }
}
