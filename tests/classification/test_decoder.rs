// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Image decoding through the public API: format detection, metadata,
//! and rejection of anything that is not a usable image.

use super::common::*;
use fabstir_image_classifier::vision::{
    decode_image_bytes, ColorMode, DecodeError, SourceFormat,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

#[test]
fn test_webp_upload_is_decoded() {
    let bytes = encode(&solid_rgb(48, 36, [10, 200, 90]), ImageFormat::WebP);
    let decoded = decode_image_bytes(&bytes).unwrap();

    assert_eq!(decoded.info.format, SourceFormat::WebP);
    assert_eq!(decoded.info.format.to_string(), "WEBP");
    assert_eq!((decoded.info.width, decoded.info.height), (48, 36));
}

#[test]
fn test_rgba_png_keeps_alpha_in_metadata() {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([1, 2, 3, 128])));
    let bytes = encode(&image, ImageFormat::Png);
    let decoded = decode_image_bytes(&bytes).unwrap();

    assert_eq!(decoded.info.color_mode, ColorMode::Rgba);
    assert_eq!(decoded.info.color_mode.to_string(), "RGBA");
}

#[test]
fn test_metadata_matches_pixels_and_upload() {
    let bytes = encode(&solid_rgb(300, 200, [50, 60, 70]), ImageFormat::Jpeg);
    let decoded = decode_image_bytes(&bytes).unwrap();

    assert_eq!(decoded.info.width, decoded.pixels.width());
    assert_eq!(decoded.info.height, decoded.pixels.height());
    assert_eq!(decoded.info.size_bytes, bytes.len());
    assert_eq!(decoded.info.size_kb(), bytes.len() / 1024);
    assert_eq!(decoded.info.color_mode, ColorMode::Rgb);
    assert_eq!(decoded.info.format, SourceFormat::Jpeg);
}

#[test]
fn test_corrupt_png_is_a_decode_error() {
    let err = decode_image_bytes(&corrupt_png()).unwrap_err();
    assert!(matches!(err, DecodeError::DecodeFailed(_)), "got {:?}", err);
}

#[test]
fn test_text_is_rejected() {
    let err = decode_image_bytes(b"<html><body>not found</body></html>").unwrap_err();
    assert!(matches!(err, DecodeError::UnsupportedFormat), "got {:?}", err);
}

#[test]
fn test_empty_input_is_rejected() {
    assert!(matches!(
        decode_image_bytes(&[]).unwrap_err(),
        DecodeError::EmptyData
    ));
}
