// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image format detection and decoding for uploaded files

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while identifying or decoding image bytes
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image has zero width or height")]
    ZeroSized,
}

/// Image formats the service knows how to decode
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
    Bmp,
    #[value(alias = "tif")]
    Tiff,
    Webp,
}

impl ImageKind {
    /// Every kind, in the order used for the default allow-list
    pub const ALL: [ImageKind; 5] = [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Bmp,
        ImageKind::Tiff,
        ImageKind::Webp,
    ];

    /// Map a declared MIME type (`image/png`, `image/jpg`, ...) to a kind
    ///
    /// Parameters such as `; charset=...` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        let essence = essence.to_ascii_lowercase();
        match essence.as_str() {
            // Non-standard aliases some clients still send
            "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/x-ms-bmp" | "image/x-bmp" => Some(ImageKind::Bmp),
            "image/tif" => Some(ImageKind::Tiff),
            other => ImageFormat::from_mime_type(other).and_then(Self::from_format),
        }
    }

    /// Map a file name's extension (`scan.TIF`) to a kind
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        ImageFormat::from_extension(ext).and_then(Self::from_format)
    }

    /// Map an `image` crate format to a kind
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Bmp => Some(ImageKind::Bmp),
            ImageFormat::Tiff => Some(ImageKind::Tiff),
            ImageFormat::WebP => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Bmp => ImageFormat::Bmp,
            ImageKind::Tiff => ImageFormat::Tiff,
            ImageKind::Webp => ImageFormat::WebP,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Bmp => "bmp",
            ImageKind::Tiff => "tiff",
            ImageKind::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            return Self::from_mime(s).ok_or(ImageError::UnsupportedFormat);
        }
        ImageFormat::from_extension(s)
            .and_then(Self::from_format)
            .ok_or(ImageError::UnsupportedFormat)
    }
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub kind: ImageKind,
    /// Size in bytes
    pub size_bytes: usize,
}

/// Decode raw image bytes (for multipart uploads)
///
/// The format is taken from the magic bytes, never from the declared type.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<(DynamicImage, ImageInfo), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let kind = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, kind.image_format())
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::ZeroSized);
    }

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        kind,
        size_bytes: bytes.len(),
    };

    Ok((img, info))
}

/// Detect image format from magic bytes
///
/// # Returns
/// * `Ok(ImageKind)` - Detected format
/// * `Err(ImageError::UnsupportedFormat)` - If format cannot be detected
pub fn detect_format(bytes: &[u8]) -> Result<ImageKind, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageKind::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageKind::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageKind::Webp),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageKind::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageKind::Tiff),

        _ => Err(ImageError::UnsupportedFormat),
    }
}
