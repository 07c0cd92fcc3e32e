// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir image classifier node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-resnet50-classifier-2025-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "resnet50-imagenet",
    "onnx-cpu-inference",
    "top-k-ranking",
    "telegram-bot",
    "http-classify",
    "serialized-inference",
    "request-cancellation",
];

/// Image formats the decoder accepts
pub const SUPPORTED_FORMATS: &[&str] = &["JPEG", "PNG", "WEBP", "GIF"];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!(
        "Fabstir Image Classifier {} ({})",
        VERSION_NUMBER, BUILD_DATE
    )
}
