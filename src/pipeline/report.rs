// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classification report and its user-facing rendering

use std::fmt::Write as _;

use serde::Serialize;

use super::state::ErrorKind;
use crate::vision::{ImageInfo, RankedPredictions};

/// Interim message shown while a request is being processed
pub const PROCESSING_MESSAGE: &str = "🔄 Processing your image with AI...";

/// Image metadata plus ranked predictions for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    image: ImageInfo,
    predictions: RankedPredictions,
}

impl ClassificationReport {
    pub fn new(image: ImageInfo, predictions: RankedPredictions) -> Self {
        Self { image, predictions }
    }

    pub fn image(&self) -> &ImageInfo {
        &self.image
    }

    pub fn predictions(&self) -> &RankedPredictions {
        &self.predictions
    }
}

/// Rank indicator for the prediction at `index` (0-based)
pub fn rank_marker(index: usize) -> &'static str {
    match index {
        0 => "🥇",
        1 => "🥈",
        2 => "🥉",
        _ => "📍",
    }
}

/// Turn a taxonomy label into display text: underscores become spaces and
/// every word starts upper case with the rest lower case
/// ("german_shepherd" -> "German Shepherd", "jack-o'-lantern" -> "Jack-O'-Lantern").
pub fn humanize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut prev_cased = false;
    for ch in label.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}

/// Confidence rendered as a percentage with one decimal place
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Render the final message for a report
pub fn format_report(report: &ClassificationReport) -> String {
    let image = report.image();
    let predictions = report.predictions();

    let mut response = String::new();
    response.push_str("📸 **Image Analysis Results**\n\n");
    response.push_str("**📏 Image Properties:**\n");
    let _ = writeln!(response, "• Size: {}×{} pixels", image.width, image.height);
    let _ = writeln!(response, "• Format: {}", image.format);
    let _ = writeln!(response, "• File size: {} KB", image.size_kb());
    let _ = writeln!(response, "• Color mode: {}", image.color_mode);
    response.push('\n');

    if predictions.is_empty() {
        response.push_str("🤖 **AI Classification:** no predictions available\n");
        return response;
    }

    let _ = writeln!(
        response,
        "🤖 **AI Classification (Top {}):**",
        predictions.len()
    );
    for (i, prediction) in predictions.iter().enumerate() {
        let _ = writeln!(
            response,
            "{} {}: {}",
            rank_marker(i),
            humanize_label(&prediction.label),
            format_confidence(prediction.confidence)
        );
    }

    if let Some(best) = predictions.top() {
        let _ = write!(
            response,
            "\n✨ **Best guess:** {}",
            humanize_label(&best.label)
        );
    }

    response
}

/// User-facing failure text; names the general problem, never internal details
pub fn failure_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Fetch => "❌ Sorry, couldn't download your image. Please try again.",
        ErrorKind::Decode => {
            "❌ Sorry, that doesn't look like a supported image. Please send a JPG, PNG, WebP or GIF photo."
        }
        ErrorKind::Preprocess | ErrorKind::Inference | ErrorKind::Rank => {
            "❌ Sorry, there was an error classifying your image. Please try again later."
        }
    }
}
