// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based image classification
//!
//! This module provides:
//! - Image decoding and metadata extraction
//! - ResNet50 preprocessing (resize, color conversion, normalization)
//! - ONNX classification and top-K ranking against the label taxonomy

pub mod classifier;
pub mod image_utils;
pub mod labels;
pub mod model_manager;
pub mod preprocessing;
pub mod ranking;

pub use classifier::{ImageClassifier, InferenceError, OnnxClassifier, OnnxClassifierConfig};
pub use image_utils::{
    decode_base64_image, decode_image_bytes, detect_format, ColorMode, DecodeError, DecodedImage,
    ImageInfo, SourceFormat,
};
pub use labels::{Taxonomy, TaxonomyEntry};
pub use model_manager::{ClassificationModel, ModelLoadConfig, ModelSpec};
pub use preprocessing::{
    ModelInput, Normalization, PreprocessConfig, PreprocessError, Preprocessor, TensorLayout,
};
pub use ranking::{rank_predictions, Prediction, RankError, RankedPredictions, DEFAULT_TOP_K};
