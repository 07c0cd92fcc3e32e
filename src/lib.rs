// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod pipeline;
pub mod telegram;
pub mod version;
pub mod vision;

// Re-export the main entry points
pub use config::AppConfig;
pub use pipeline::{ClassificationPipeline, PipelineConfig, PipelineOutcome, RequestState, Stage};
pub use vision::{ClassificationModel, ImageClassifier, ModelLoadConfig, ModelSpec};
