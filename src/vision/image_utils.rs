// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding and metadata extraction for classification requests

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ColorType, DynamicImage, ImageFormat};
use serde::Serialize;
use thiserror::Error;

/// Maximum image size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors raised while turning raw bytes into a decoded image
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Decoded image has zero dimensions ({0}x{1})")]
    ZeroDimensions(u32, u32),
}

/// Container format of the uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    /// Decodable by the image crate but not one of the formats above (BMP, TIFF, ...)
    Unknown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WEBP",
            Self::Gif => "GIF",
            Self::Unknown => "Unknown",
        }
    }

    fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::WebP => Self::WebP,
            ImageFormat::Gif => Self::Gif,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel color mode of the decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorMode {
    Rgb,
    Rgba,
    Grayscale,
    Other,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Grayscale => "Grayscale",
            Self::Other => "Other",
        }
    }

    pub fn from_color_type(color: ColorType) -> Self {
        match color {
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => Self::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => Self::Rgba,
            ColorType::L8 | ColorType::L16 => Self::Grayscale,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image information extracted during loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color mode of the source pixels
    pub color_mode: ColorMode,
    /// Detected container format
    pub format: SourceFormat,
    /// Size of the raw upload in bytes
    pub size_bytes: usize,
}

impl ImageInfo {
    /// Size in whole kilobytes, rounded down
    pub fn size_kb(&self) -> usize {
        self.size_bytes / 1024
    }
}

/// A successfully decoded image: pixel buffer plus metadata
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub info: ImageInfo,
}

/// Decode a base64-encoded image
///
/// # Example
/// ```ignore
/// let decoded = decode_base64_image("iVBORw0KGgo...")?;
/// println!("Image size: {}x{}", decoded.info.width, decoded.info.height);
/// ```
pub fn decode_base64_image(base64_str: &str) -> Result<DecodedImage, DecodeError> {
    if base64_str.is_empty() {
        return Err(DecodeError::EmptyData);
    }

    let bytes = STANDARD.decode(base64_str)?;
    decode_image_bytes(&bytes)
}

/// Decode raw image bytes
///
/// # Returns
/// * `Ok(DecodedImage)` - The decoded pixels and metadata (width and height always > 0)
/// * `Err(DecodeError)` - Empty, oversized, unrecognized or truncated input
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(DecodeError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
    }

    if bytes.is_empty() {
        return Err(DecodeError::EmptyData);
    }

    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(DecodeError::ZeroDimensions(img.width(), img.height()));
    }

    let info = ImageInfo {
        width: img.width(),
        height: img.height(),
        color_mode: ColorMode::from_color_type(img.color()),
        format: SourceFormat::from_image_format(format),
        size_bytes: bytes.len(),
    };

    Ok(DecodedImage { pixels: img, info })
}

/// Detect image format from magic bytes
///
/// The four photo formats are matched directly; anything else is handed to
/// the image crate's own sniffing so BMP/TIFF uploads still decode.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        _ => image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat),
    }
}
