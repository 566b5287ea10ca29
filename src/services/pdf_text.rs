//! Optional document text extraction.
//!
//! The capability is resolved at build time: with the `pdf-text` feature
//! (default) the `pdf-extract` parser is compiled in; without it the call
//! reports `CapabilityUnavailable` as a first-class error rather than
//! failing at some load site deep inside a request.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextExtractError {
    #[error("document text extraction is not available in this build")]
    CapabilityUnavailable,
    #[error("failed to extract text: {0}")]
    Extraction(String),
}

/// Whether this build carries the text extraction capability.
pub const fn available() -> bool {
    cfg!(feature = "pdf-text")
}

/// Extract the text layer of a PDF document.
pub async fn extract_text(path: &Path) -> Result<String, TextExtractError> {
    if !available() {
        return Err(TextExtractError::CapabilityUnavailable);
    }
    read_pdf_text(path).await
}

#[cfg(feature = "pdf-text")]
async fn read_pdf_text(path: &Path) -> Result<String, TextExtractError> {
    let path = path.to_path_buf();
    // pdf-extract is synchronous and can chew on large documents.
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|err| TextExtractError::Extraction(err.to_string()))?
        .map_err(|err| TextExtractError::Extraction(err.to_string()))?;

    if text.trim().is_empty() {
        Ok("No text found in PDF".to_string())
    } else {
        Ok(text)
    }
}

#[cfg(not(feature = "pdf-text"))]
async fn read_pdf_text(_path: &Path) -> Result<String, TextExtractError> {
    Err(TextExtractError::CapabilityUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "pdf-text")]
    #[tokio::test]
    async fn unparseable_document_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated garbage").unwrap();

        let err = extract_text(&path).await.unwrap_err();
        assert!(matches!(err, TextExtractError::Extraction(_)));
    }

    #[cfg(not(feature = "pdf-text"))]
    #[tokio::test]
    async fn absent_capability_is_reported_as_such() {
        let err = extract_text(Path::new("whatever.pdf")).await.unwrap_err();
        assert!(matches!(err, TextExtractError::CapabilityUnavailable));
    }
}
