// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classify response types

use serde::{Deserialize, Serialize};

use crate::pipeline::{format_report, humanize_label, ClassificationReport};
use crate::vision::ModelSpec;

/// One prediction as returned over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedLabel {
    /// 1-based rank
    pub rank: usize,
    pub class_index: usize,
    pub label: String,
    /// Display form of the label ("Golden Retriever")
    pub display_label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub color_mode: String,
    pub size_bytes: usize,
    pub predictions: Vec<RankedLabel>,
    /// The same text a chat user would receive
    pub report: String,
    /// Model identifier, "<name>@<version>"
    pub model: String,
    pub processing_time_ms: u64,
}

impl ClassifyResponse {
    pub fn from_report(report: &ClassificationReport, spec: &ModelSpec, processing_time_ms: u64) -> Self {
        let image = report.image();
        let predictions = report
            .predictions()
            .iter()
            .enumerate()
            .map(|(i, p)| RankedLabel {
                rank: i + 1,
                class_index: p.class_index,
                label: p.label.clone(),
                display_label: humanize_label(&p.label),
                confidence: p.confidence,
            })
            .collect();

        Self {
            width: image.width,
            height: image.height,
            format: image.format.to_string(),
            color_mode: image.color_mode.to_string(),
            size_bytes: image.size_bytes,
            predictions,
            report: format_report(report),
            model: format!("{}@{}", spec.name, spec.version),
            processing_time_ms,
        }
    }
}
