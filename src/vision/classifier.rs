// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image classifier: one forward pass from [`ModelInput`] to class scores
//!
//! The ONNX implementation wraps a ResNet50 export and runs on CPU only.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::preprocessing::{ModelInput, TensorLayout};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Input shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Model produced {actual} scores, expected {expected}")]
    OutputLength { expected: usize, actual: usize },

    #[error("Model produced a non-finite score at index {0}")]
    NonFinite(usize),

    #[error("Inference engine error: {0}")]
    Engine(String),

    #[error("Inference worker failed: {0}")]
    Worker(String),
}

/// Any engine that maps a preprocessed tensor to one score per taxonomy class
///
/// Implementations must be shareable across request tasks; they are only
/// ever used through `&self` after construction.
pub trait ImageClassifier: Send + Sync {
    /// Number of scores returned by [`ImageClassifier::classify`]
    fn num_classes(&self) -> usize;

    /// Run one forward pass
    fn classify(&self, input: &ModelInput) -> Result<Vec<f32>, InferenceError>;
}

/// Apply softmax to convert logits to probabilities
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    // Subtract max for numerical stability
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_values: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exp_values.iter().sum();
    exp_values.iter().map(|&x| x / sum).collect()
}

/// Check a raw output vector and optionally normalize it
pub fn finalize_scores(
    raw: Vec<f32>,
    expected_len: usize,
    apply_softmax: bool,
) -> Result<Vec<f32>, InferenceError> {
    if raw.len() != expected_len {
        return Err(InferenceError::OutputLength {
            expected: expected_len,
            actual: raw.len(),
        });
    }

    if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite(index));
    }

    let scores = if apply_softmax { softmax(&raw) } else { raw };

    // softmax over huge logits can still overflow to NaN
    if let Some(index) = scores.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite(index));
    }

    Ok(scores)
}

/// Settings for the ONNX classifier
#[derive(Debug, Clone)]
pub struct OnnxClassifierConfig {
    /// Number of output classes (must equal the taxonomy size)
    pub num_classes: usize,
    /// Spatial input size the model was exported with
    pub input_size: usize,
    /// Input tensor layout the model expects
    pub layout: TensorLayout,
    /// Apply softmax to the output (for exports that end in logits)
    pub apply_softmax: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for OnnxClassifierConfig {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            input_size: 224,
            layout: TensorLayout::Nhwc,
            apply_softmax: false,
            intra_threads: 4,
        }
    }
}

impl OnnxClassifierConfig {
    fn expected_input_shape(&self) -> Vec<usize> {
        match self.layout {
            TensorLayout::Nhwc => vec![1, self.input_size, self.input_size, 3],
            TensorLayout::Nchw => vec![1, 3, self.input_size, self.input_size],
        }
    }
}

/// ResNet50 classifier backed by ONNX Runtime
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent callers are serialized here.
#[derive(Clone)]
pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
    config: OnnxClassifierConfig,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load the classifier from an ONNX file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn new<P: AsRef<Path>>(model_path: P, config: OnnxClassifierConfig) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Classifier model not found: {}", model_path.display());
        }

        info!("Loading image classifier from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load classifier model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input_1".to_string());

        debug!(
            "Classifier loaded - input: {}, outputs: {}",
            input_name,
            session.outputs.len()
        );

        info!(
            "✅ Image classifier loaded (CPU-only, {} classes, {:?} input)",
            config.num_classes, config.layout
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            config,
        })
    }

    pub fn config(&self) -> &OnnxClassifierConfig {
        &self.config
    }
}

impl ImageClassifier for OnnxClassifier {
    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn classify(&self, input: &ModelInput) -> Result<Vec<f32>, InferenceError> {
        let expected = self.config.expected_input_shape();
        if input.shape() != expected.as_slice() {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: input.shape().to_vec(),
            });
        }

        let input_value = Value::from_array(input.view().to_owned())
            .map_err(|e| InferenceError::Engine(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Engine("classifier session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| InferenceError::Engine(format!("Classifier inference failed: {}", e)))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::Engine(format!("Failed to extract output tensor: {}", e)))?;

        debug!("Classifier output shape: {:?}", output_tensor.shape());
        let raw: Vec<f32> = output_tensor.iter().copied().collect();

        finalize_scores(raw, self.config.num_classes, self.config.apply_softmax)
    }
}
