//! Extracted file metadata as a closed tagged union.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared MIME type that routes a file onto the document extraction path.
pub const DOCUMENT_MIME: &str = "application/pdf";

/// Fixed note attached to document metadata. Document extraction is
/// intentionally shallow (byte size only); richer structured extraction can
/// replace the note without touching the variant shape.
pub const DOCUMENT_NOTE: &str = "PDF analysis - basic metadata only";

/// Classification a file is routed into before extraction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Image,
    Document,
    Generic,
}

impl FileClass {
    /// Classify by the caller-declared MIME type.
    pub fn from_declared_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileClass::Image
        } else if mime == DOCUMENT_MIME {
            FileClass::Document
        } else {
            FileClass::Generic
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileClass::Image => write!(f, "image"),
            FileClass::Document => write!(f, "document"),
            FileClass::Generic => write!(f, "generic"),
        }
    }
}

/// Metadata extracted for a stored file.
///
/// Exactly one variant describes any record. Extraction never fails upward:
/// an extractor that cannot analyze its input produces `Failed` carrying the
/// classification it was attempting and an error description, and ingestion
/// proceeds with that.
///
/// Serialized with an explicit `type` tag and camelCase payload keys, which is
/// the shape persisted into the `metadata` column and returned over the API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileMetadata {
    #[serde(rename_all = "camelCase")]
    Image {
        width: u32,
        height: u32,
        /// Encoded format name, e.g. "jpeg", "png".
        format: String,
        has_alpha: bool,
        color_space: String,
        channels: u8,
        /// Pixels per inch, when the container declares one.
        #[serde(skip_serializing_if = "Option::is_none")]
        density: Option<u32>,
        file_size: u64,
    },
    #[serde(rename_all = "camelCase")]
    Document { file_size: u64, note: String },
    #[serde(rename_all = "camelCase")]
    Generic {
        file_size: u64,
        /// MIME type sniffed from the actual bytes, independent of the
        /// declared type. Absent when the magic bytes match nothing known.
        #[serde(skip_serializing_if = "Option::is_none")]
        detected_mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Failed { classification: FileClass, error: String },
}

impl FileMetadata {
    /// The classification this metadata was produced under.
    pub fn classification(&self) -> FileClass {
        match self {
            FileMetadata::Image { .. } => FileClass::Image,
            FileMetadata::Document { .. } => FileClass::Document,
            FileMetadata::Generic { .. } => FileClass::Generic,
            FileMetadata::Failed { classification, .. } => *classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_declared_mime() {
        assert_eq!(FileClass::from_declared_mime("image/png"), FileClass::Image);
        assert_eq!(
            FileClass::from_declared_mime("application/pdf"),
            FileClass::Document
        );
        assert_eq!(
            FileClass::from_declared_mime("application/octet-stream"),
            FileClass::Generic
        );
        assert_eq!(
            FileClass::from_declared_mime("text/plain"),
            FileClass::Generic
        );
    }

    #[test]
    fn metadata_json_shape_is_tagged_camel_case() {
        let meta = FileMetadata::Generic {
            file_size: 12,
            detected_mime_type: Some("image/png".into()),
            extension: Some("png".into()),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["type"], "generic");
        assert_eq!(value["fileSize"], 12);
        assert_eq!(value["detectedMimeType"], "image/png");

        let failed = FileMetadata::Failed {
            classification: FileClass::Image,
            error: "decode failed".into(),
        };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["type"], "failed");
        assert_eq!(value["classification"], "image");
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let meta = FileMetadata::Image {
            width: 640,
            height: 480,
            format: "jpeg".into(),
            has_alpha: false,
            color_space: "srgb".into(),
            channels: 3,
            density: Some(72),
            file_size: 1024,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: FileMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
