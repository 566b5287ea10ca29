//! Per-classification metadata extraction.
//!
//! The single entry point is [`MetadataExtractor::extract`], which is total:
//! whatever the bytes on disk look like, it returns a well-formed
//! [`FileMetadata`] value and never an error. Ingestion depends on that —
//! a record must be created even when analysis fails, carrying the `Failed`
//! variant instead.

use crate::models::metadata::{DOCUMENT_NOTE, FileClass, FileMetadata};
use anyhow::Result;
use image::{GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tokio::fs;

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Analyze the file at `path`, dispatching on the declared MIME type:
    /// `image/*` is decoded as an image, the document MIME gets the shallow
    /// document treatment, everything else is sniffed from its magic bytes.
    pub async fn extract(path: &Path, declared_mime: &str) -> FileMetadata {
        let classification = FileClass::from_declared_mime(declared_mime);
        let result = match classification {
            FileClass::Image => Self::analyze_image(path).await,
            FileClass::Document => Self::analyze_document(path).await,
            FileClass::Generic => Self::analyze_generic(path).await,
        };

        match result {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    %classification,
                    "metadata extraction failed: {err:#}"
                );
                FileMetadata::Failed {
                    classification,
                    error: err.to_string(),
                }
            }
        }
    }

    /// Decode the file as an image and read its intrinsic properties.
    async fn analyze_image(path: &Path) -> Result<FileMetadata> {
        let bytes = fs::read(path).await?;
        let reader = ImageReader::new(Cursor::new(&bytes)).with_guessed_format()?;
        let format = reader.format();
        let img = reader.decode()?;
        let color = img.color();
        let (width, height) = img.dimensions();

        Ok(FileMetadata::Image {
            width,
            height,
            format: format_name(format),
            has_alpha: color.has_alpha(),
            color_space: color_space_name(color),
            channels: color.channel_count(),
            density: read_density(&bytes, format),
            file_size: bytes.len() as u64,
        })
    }

    /// Byte size plus a fixed note. Intentionally shallow; see
    /// [`DOCUMENT_NOTE`].
    async fn analyze_document(path: &Path) -> Result<FileMetadata> {
        let meta = fs::metadata(path).await?;
        Ok(FileMetadata::Document {
            file_size: meta.len(),
            note: DOCUMENT_NOTE.to_string(),
        })
    }

    /// Sniff the real content type from the bytes themselves. This is what
    /// catches uploads whose declared MIME type lies about the payload.
    async fn analyze_generic(path: &Path) -> Result<FileMetadata> {
        let bytes = fs::read(path).await?;
        let kind = infer::get(&bytes);

        Ok(FileMetadata::Generic {
            file_size: bytes.len() as u64,
            detected_mime_type: kind.map(|k| k.mime_type().to_string()),
            extension: kind.map(|k| k.extension().to_string()),
        })
    }
}

fn format_name(format: Option<ImageFormat>) -> String {
    match format {
        Some(ImageFormat::Jpeg) => "jpeg".to_string(),
        Some(ImageFormat::Png) => "png".to_string(),
        Some(ImageFormat::WebP) => "webp".to_string(),
        Some(ImageFormat::Gif) => "gif".to_string(),
        Some(other) => format!("{other:?}").to_lowercase(),
        None => "unknown".to_string(),
    }
}

fn color_space_name(color: image::ColorType) -> String {
    use image::ColorType::*;
    match color {
        L8 | L16 | La8 | La16 => "b-w".to_string(),
        _ => "srgb".to_string(),
    }
}

/// Pixel density (DPI) as declared by the container, when it declares one.
fn read_density(bytes: &[u8], format: Option<ImageFormat>) -> Option<u32> {
    match format {
        Some(ImageFormat::Png) => png_density(bytes),
        Some(ImageFormat::Jpeg) => jpeg_density(bytes),
        _ => None,
    }
}

/// Walk PNG chunks looking for pHYs; unit 1 means pixels per metre.
fn png_density(bytes: &[u8]) -> Option<u32> {
    let mut pos = 8; // past the signature
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let chunk_type = &bytes[pos + 4..pos + 8];
        if chunk_type == b"pHYs" {
            if pos + 8 + 9 > bytes.len() {
                return None;
            }
            let ppm = u32::from_be_bytes(bytes[pos + 8..pos + 12].try_into().ok()?);
            let unit = bytes[pos + 16];
            if unit == 1 {
                return Some((f64::from(ppm) * 0.0254).round() as u32);
            }
            return None;
        }
        if chunk_type == b"IDAT" {
            // pHYs must precede the image data
            return None;
        }
        pos += 12 + len;
    }
    None
}

/// Scan JPEG marker segments for a JFIF APP0 density declaration.
fn jpeg_density(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() && bytes[pos] == 0xFF {
        let marker = bytes[pos + 1];
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > bytes.len() {
            return None;
        }
        if marker == 0xE0 && len >= 14 {
            let seg = &bytes[pos + 4..pos + 2 + len];
            if &seg[0..5] == b"JFIF\0" {
                let unit = seg[7];
                let x_density = u32::from(u16::from_be_bytes([seg[8], seg[9]]));
                return match unit {
                    1 => Some(x_density),
                    2 => Some((f64::from(x_density) * 2.54).round() as u32),
                    _ => None,
                };
            }
        }
        if marker == 0xDA {
            // start of scan, no JFIF header coming after this
            return None;
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::path::PathBuf;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    #[tokio::test]
    async fn image_path_reads_intrinsic_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "sample.png", 64, 40);
        let on_disk = std::fs::metadata(&path).unwrap().len();

        let meta = MetadataExtractor::extract(&path, "image/png").await;
        match meta {
            FileMetadata::Image {
                width,
                height,
                format,
                has_alpha,
                color_space,
                channels,
                file_size,
                ..
            } => {
                assert_eq!((width, height), (64, 40));
                assert_eq!(format, "png");
                assert!(has_alpha);
                assert_eq!(color_space, "srgb");
                assert_eq!(channels, 4);
                assert_eq!(file_size, on_disk);
            }
            other => panic!("expected image metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn grayscale_image_reports_bw_color_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([128]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();

        match MetadataExtractor::extract(&path, "image/png").await {
            FileMetadata::Image {
                color_space,
                channels,
                has_alpha,
                ..
            } => {
                assert_eq!(color_space, "b-w");
                assert_eq!(channels, 1);
                assert!(!has_alpha);
            }
            other => panic!("expected image metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_image_degrades_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        match MetadataExtractor::extract(&path, "image/jpeg").await {
            FileMetadata::Failed {
                classification,
                error,
            } => {
                assert_eq!(classification, FileClass::Image);
                assert!(!error.is_empty());
            }
            other => panic!("expected failed metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_never_raises() {
        let meta =
            MetadataExtractor::extract(Path::new("/nonexistent/void.bin"), "text/plain").await;
        assert!(matches!(
            meta,
            FileMetadata::Failed {
                classification: FileClass::Generic,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn document_path_is_size_and_note_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 minimal").unwrap();

        match MetadataExtractor::extract(&path, "application/pdf").await {
            FileMetadata::Document { file_size, note } => {
                assert_eq!(file_size, 16);
                assert_eq!(note, DOCUMENT_NOTE);
            }
            other => panic!("expected document metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generic_path_sniffs_real_type_of_mislabeled_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "mislabeled.bin", 10, 10);

        // Declared as an opaque blob; the bytes are a PNG.
        match MetadataExtractor::extract(&path, "application/octet-stream").await {
            FileMetadata::Generic {
                detected_mime_type,
                extension,
                file_size,
            } => {
                assert_eq!(detected_mime_type.as_deref(), Some("image/png"));
                assert_eq!(extension.as_deref(), Some("png"));
                assert!(file_size > 0);
            }
            other => panic!("expected generic metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generic_path_tolerates_unrecognized_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text, no magic").unwrap();

        match MetadataExtractor::extract(&path, "text/plain").await {
            FileMetadata::Generic {
                detected_mime_type,
                extension,
                file_size,
            } => {
                assert_eq!(detected_mime_type, None);
                assert_eq!(extension, None);
                assert_eq!(file_size, 20);
            }
            other => panic!("expected generic metadata, got {other:?}"),
        }
    }

    #[test]
    fn jpeg_density_reads_jfif_dpi() {
        // Hand-built SOI + APP0 JFIF segment declaring 300dpi.
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[1, 2]); // version
        bytes.push(1); // units: dots per inch
        bytes.extend_from_slice(&300u16.to_be_bytes());
        bytes.extend_from_slice(&300u16.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]); // no thumbnail
        assert_eq!(jpeg_density(&bytes), Some(300));
    }

    #[test]
    fn png_without_phys_has_no_density() {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        assert_eq!(png_density(&buf), None);
    }
}
