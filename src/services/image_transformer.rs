//! Stateless image transformation operations.
//!
//! Each operation takes a source path and produces a new derived file whose
//! path follows a deterministic rule (`_resized`, `_cropped`, `_compressed`,
//! or an extension swap for conversion). Sources are never mutated. Derived
//! outputs are transient artifacts owned by the caller, not tracked records;
//! two concurrent calls on the same source race benignly on the same output
//! path (last write wins).
//!
//! Unlike metadata extraction, transforms fail hard: a decode or encode error
//! has no meaningful degraded output, so it surfaces as [`TransformError`].

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unsupported target format `{0}`, expected one of: jpeg, png, webp")]
    UnsupportedFormat(String),
    #[error("invalid crop rectangle: x={x} y={y} width={width} height={height}")]
    InvalidCrop { x: i64, y: i64, width: i64, height: i64 },
    #[error(
        "crop rectangle {width}x{height}+{x}+{y} exceeds image bounds {src_width}x{src_height}"
    )]
    OutOfBounds {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        src_width: u32,
        src_height: u32,
    },
    #[error("image processing failed: {0}")]
    Processing(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Target formats a conversion may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn parse(s: &str) -> TransformResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(TransformError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Extension used when the output path swaps extension on conversion.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

/// How a target box and the source aspect ratio interact during resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Crop to fill the box exactly.
    Cover,
    /// Letterbox onto a canvas of the box size.
    Contain,
    /// Stretch to the box, disregarding aspect ratio.
    Fill,
    /// Scale to fit within the box.
    #[default]
    Inside,
    /// Scale to cover the box, one dimension may exceed it.
    Outside,
}

impl FitMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cover" => Some(FitMode::Cover),
            "contain" => Some(FitMode::Contain),
            "fill" => Some(FitMode::Fill),
            "inside" => Some(FitMode::Inside),
            "outside" => Some(FitMode::Outside),
            _ => None,
        }
    }
}

pub struct ImageTransformer;

impl ImageTransformer {
    /// Re-encode to `target_format`, optionally resizing first (fit `inside`,
    /// never upscaling). The output path is the source path with its
    /// extension swapped to the target format.
    pub async fn convert(
        path: &Path,
        target_format: &str,
        width: Option<u32>,
        height: Option<u32>,
        quality: Option<u8>,
    ) -> TransformResult<PathBuf> {
        // Validate the format before touching the filesystem.
        let format = OutputFormat::parse(target_format)?;
        let quality = effective_quality(quality);

        let (_, img) = load(path).await?;
        let img = if width.is_some() || height.is_some() {
            fit_image(&img, width, height, FitMode::Inside)
        } else {
            img
        };

        let bytes = encode(&img, format, quality)?;
        let output = path.with_extension(format.extension());
        fs::write(&output, &bytes).await?;
        Ok(output)
    }

    /// Re-encode with the source's own detected codec at `quality`. Sources
    /// that are not jpeg/png/webp fall back to jpeg — the common denominator
    /// for lossy compression — and the output path carries `.jpg`.
    pub async fn compress(path: &Path, quality: Option<u8>) -> TransformResult<PathBuf> {
        let quality = effective_quality(quality);
        let (detected, img) = load(path).await?;

        let (target, fell_back) = match detected {
            Some(ImageFormat::Jpeg) => (OutputFormat::Jpeg, false),
            Some(ImageFormat::Png) => (OutputFormat::Png, false),
            Some(ImageFormat::WebP) => (OutputFormat::Webp, false),
            _ => (OutputFormat::Jpeg, true),
        };

        let bytes = encode(&img, target, quality)?;
        let output = if fell_back {
            derived_path(path, "_compressed").with_extension("jpg")
        } else {
            derived_path(path, "_compressed")
        };
        fs::write(&output, &bytes).await?;
        Ok(output)
    }

    /// Resize into a target box under `fit`. Upscaling beyond the source
    /// resolution is never performed for any mode; `contain` may still pad
    /// its canvas out to the requested box. Output keeps the source format
    /// at `{stem}_resized.{ext}`.
    pub async fn resize(
        path: &Path,
        width: Option<u32>,
        height: Option<u32>,
        fit: FitMode,
    ) -> TransformResult<PathBuf> {
        let (detected, img) = load(path).await?;
        let resized = fit_image(&img, width, height, fit);

        let bytes = encode_in_format(&resized, detected.unwrap_or(ImageFormat::Png))?;
        let output = derived_path(path, "_resized");
        fs::write(&output, &bytes).await?;
        Ok(output)
    }

    /// Extract the rectangle `[x, x+width) x [y, y+height)`. The rectangle
    /// must lie fully inside the source. Output keeps the source format at
    /// `{stem}_cropped.{ext}`.
    pub async fn crop(
        path: &Path,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> TransformResult<PathBuf> {
        if x < 0 || y < 0 || width <= 0 || height <= 0 {
            return Err(TransformError::InvalidCrop {
                x,
                y,
                width,
                height,
            });
        }

        let (detected, img) = load(path).await?;
        let (src_width, src_height) = img.dimensions();
        if x + width > i64::from(src_width) || y + height > i64::from(src_height) {
            return Err(TransformError::OutOfBounds {
                x,
                y,
                width,
                height,
                src_width,
                src_height,
            });
        }

        let cropped = img.crop_imm(x as u32, y as u32, width as u32, height as u32);
        let bytes = encode_in_format(&cropped, detected.unwrap_or(ImageFormat::Png))?;
        let output = derived_path(path, "_cropped");
        fs::write(&output, &bytes).await?;
        Ok(output)
    }
}

async fn load(path: &Path) -> TransformResult<(Option<ImageFormat>, DynamicImage)> {
    let bytes = fs::read(path).await?;
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let img = reader.decode()?;
    Ok((format, img))
}

/// `{stem}{suffix}.{ext}`, next to the source.
fn derived_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let mut name = format!("{stem}{suffix}");
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    path.with_file_name(name)
}

fn effective_quality(quality: Option<u8>) -> u8 {
    quality.unwrap_or(DEFAULT_QUALITY).clamp(1, 100)
}

/// Resolve a possibly one-sided target box against the source aspect ratio.
fn target_box(orig_width: u32, orig_height: u32, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w.max(1), h.max(1)),
        (Some(w), None) => {
            let h = (f64::from(w) * f64::from(orig_height) / f64::from(orig_width)).round() as u32;
            (w.max(1), h.max(1))
        }
        (None, Some(h)) => {
            let w = (f64::from(h) * f64::from(orig_width) / f64::from(orig_height)).round() as u32;
            (w.max(1), h.max(1))
        }
        (None, None) => (orig_width, orig_height),
    }
}

/// Pick an interpolation filter by downscale ratio: stronger kernels are
/// wasted on heavy reductions.
fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width.max(1) as f32;
    let height_ratio = orig_height as f32 / new_height.max(1) as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn fit_image(
    img: &DynamicImage,
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    if width.is_none() && height.is_none() {
        return img.clone();
    }
    let (box_width, box_height) = target_box(orig_width, orig_height, width, height);

    match fit {
        FitMode::Fill => {
            let w = box_width.min(orig_width);
            let h = box_height.min(orig_height);
            img.resize_exact(w, h, select_filter(orig_width, orig_height, w, h))
        }
        FitMode::Cover => {
            let w = box_width.min(orig_width);
            let h = box_height.min(orig_height);
            img.resize_to_fill(w, h, select_filter(orig_width, orig_height, w, h))
        }
        FitMode::Inside => {
            if box_width >= orig_width && box_height >= orig_height {
                img.clone()
            } else {
                img.resize(
                    box_width,
                    box_height,
                    select_filter(orig_width, orig_height, box_width, box_height),
                )
            }
        }
        FitMode::Outside => {
            let scale = (f64::from(box_width) / f64::from(orig_width))
                .max(f64::from(box_height) / f64::from(orig_height))
                .min(1.0);
            if scale >= 1.0 {
                img.clone()
            } else {
                let w = ((f64::from(orig_width) * scale).round() as u32).max(1);
                let h = ((f64::from(orig_height) * scale).round() as u32).max(1);
                img.resize_exact(w, h, select_filter(orig_width, orig_height, w, h))
            }
        }
        FitMode::Contain => letterbox(img, box_width, box_height),
    }
}

/// Scale down to fit (never up) and center onto a white canvas of the target
/// size.
fn letterbox(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    let (orig_width, orig_height) = img.dimensions();
    let scale = (f64::from(target_width) / f64::from(orig_width))
        .min(f64::from(target_height) / f64::from(orig_height))
        .min(1.0);
    let scaled_width = ((f64::from(orig_width) * scale).round() as u32).max(1);
    let scaled_height = ((f64::from(orig_height) * scale).round() as u32).max(1);

    let canvas = RgbaImage::from_pixel(target_width, target_height, Rgba([255, 255, 255, 255]));
    let mut canvas = DynamicImage::ImageRgba8(canvas);
    let x_offset = i64::from((target_width - scaled_width) / 2);
    let y_offset = i64::from((target_height - scaled_height) / 2);

    if scale < 1.0 {
        let resized = img.resize_exact(
            scaled_width,
            scaled_height,
            select_filter(orig_width, orig_height, scaled_width, scaled_height),
        );
        image::imageops::overlay(&mut canvas, &resized, x_offset, y_offset);
    } else {
        image::imageops::overlay(&mut canvas, img, x_offset, y_offset);
    }
    canvas
}

/// Quality-bearing encode for the three convertible formats.
fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> TransformResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
            rgb.write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                Cursor::new(&mut buf),
                png_compression(quality),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)?;
        }
        OutputFormat::Webp => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            let encoder = webp::Encoder::from_rgba(&rgba, width, height);
            buf = encoder.encode(f32::from(quality)).to_vec();
        }
    }
    Ok(buf)
}

/// PNG is lossless; quality maps onto how hard the deflate stage works.
fn png_compression(quality: u8) -> CompressionType {
    if quality < 50 {
        CompressionType::Best
    } else if quality < 90 {
        CompressionType::Default
    } else {
        CompressionType::Fast
    }
}

/// Format-preserving encode used by resize and crop.
fn encode_in_format(img: &DynamicImage, format: ImageFormat) -> TransformResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    match format {
        // The baseline jpeg encoder rejects alpha channels.
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_to(&mut cursor, ImageFormat::Jpeg)?;
        }
        _ => img.write_to(&mut cursor, format)?,
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let mut img = RgbaImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 90, 255]);
        }
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    fn decoded(path: &Path) -> (Option<ImageFormat>, DynamicImage) {
        let reader = ImageReader::open(path).unwrap().with_guessed_format().unwrap();
        let format = reader.format();
        (format, reader.decode().unwrap())
    }

    #[tokio::test]
    async fn resize_inside_never_upscales() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::resize(&src, Some(400), Some(400), FitMode::Inside)
            .await
            .unwrap();
        assert_eq!(out.file_name().unwrap(), "photo_resized.png");
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (100, 60));
    }

    #[tokio::test]
    async fn resize_inside_preserves_aspect_on_single_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::resize(&src, Some(50), None, FitMode::Inside)
            .await
            .unwrap();
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (50, 30));
    }

    #[tokio::test]
    async fn resize_fill_stretches_to_exact_box() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::resize(&src, Some(40), Some(40), FitMode::Fill)
            .await
            .unwrap();
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[tokio::test]
    async fn resize_cover_crops_to_exact_box() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::resize(&src, Some(50), Some(50), FitMode::Cover)
            .await
            .unwrap();
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (50, 50));
    }

    #[tokio::test]
    async fn resize_contain_letterboxes_onto_requested_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::resize(&src, Some(50), Some(50), FitMode::Contain)
            .await
            .unwrap();
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (50, 50));
    }

    #[tokio::test]
    async fn resize_outside_covers_box_without_upscaling() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        // Covering 30x30 from 100x60 scales by max ratio 0.5 -> 50x30.
        let out = ImageTransformer::resize(&src, Some(30), Some(30), FitMode::Outside)
            .await
            .unwrap();
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (50, 30));
    }

    #[tokio::test]
    async fn crop_extracts_exact_rectangle() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::crop(&src, 10, 10, 20, 15).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "photo_cropped.png");
        let (_, img) = decoded(&out);
        assert_eq!(img.dimensions(), (20, 15));
    }

    #[tokio::test]
    async fn crop_rejects_rectangle_exceeding_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let err = ImageTransformer::crop(&src, 90, 0, 20, 20).await.unwrap_err();
        assert!(matches!(err, TransformError::OutOfBounds { .. }));
        assert!(!dir.path().join("photo_cropped.png").exists());
    }

    #[tokio::test]
    async fn crop_rejects_non_positive_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let err = ImageTransformer::crop(&src, 10, 10, -5, 20).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidCrop { .. }));
        let err = ImageTransformer::crop(&src, -1, 0, 5, 5).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidCrop { .. }));
        assert!(!dir.path().join("photo_cropped.png").exists());
    }

    #[tokio::test]
    async fn convert_swaps_extension_and_codec() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::convert(&src, "jpeg", None, None, Some(70))
            .await
            .unwrap();
        assert_eq!(out.file_name().unwrap(), "photo.jpeg");
        let (format, img) = decoded(&out);
        assert_eq!(format, Some(ImageFormat::Jpeg));
        assert_eq!(img.dimensions(), (100, 60));
        // Source still present and untouched.
        assert!(src.exists());
    }

    #[tokio::test]
    async fn convert_applies_inside_resize_without_upscaling() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::convert(&src, "webp", Some(400), Some(10), None)
            .await
            .unwrap();
        let (format, img) = decoded(&out);
        assert_eq!(format, Some(ImageFormat::WebP));
        // Bounded by height 10, aspect kept, no upscale.
        assert_eq!(img.dimensions(), (17, 10));
    }

    #[tokio::test]
    async fn convert_rejects_format_outside_the_set_before_io() {
        let err = ImageTransformer::convert(Path::new("/no/such/file.png"), "bmp", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn compress_keeps_png_sources_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_test_png(dir.path(), "photo.png", 100, 60);

        let out = ImageTransformer::compress(&src, Some(80)).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "photo_compressed.png");
        let (format, _) = decoded(&out);
        assert_eq!(format, Some(ImageFormat::Png));
    }

    #[tokio::test]
    async fn compress_falls_back_to_jpeg_for_other_codecs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("anim.gif");
        let img = RgbaImage::from_pixel(20, 20, Rgba([10, 200, 10, 255]));
        DynamicImage::ImageRgba8(img)
            .save_with_format(&src, ImageFormat::Gif)
            .unwrap();

        let out = ImageTransformer::compress(&src, None).await.unwrap();
        assert_eq!(out.file_name().unwrap(), "anim_compressed.jpg");
        let (format, _) = decoded(&out);
        assert_eq!(format, Some(ImageFormat::Jpeg));
    }

    #[tokio::test]
    async fn corrupt_source_is_a_hard_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("junk.png");
        std::fs::write(&src, b"not an image at all").unwrap();

        let err = ImageTransformer::resize(&src, Some(10), None, FitMode::Inside)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Processing(_)));
        assert!(!dir.path().join("junk_resized.png").exists());
    }

    #[test]
    fn output_format_parse_accepts_aliases_only_in_set() {
        assert_eq!(OutputFormat::parse("jpg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::parse("WEBP").unwrap(), OutputFormat::Webp);
        assert!(OutputFormat::parse("avif").is_err());
        assert!(OutputFormat::parse("gif").is_err());
    }
}
