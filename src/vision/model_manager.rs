// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared classification model: weights, taxonomy and preprocessing loaded once

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::classifier::{ImageClassifier, InferenceError, OnnxClassifier, OnnxClassifierConfig};
use super::labels::Taxonomy;
use super::preprocessing::{ModelInput, Normalization, PreprocessConfig, Preprocessor, TensorLayout};

/// Maximum model size to download at startup (ResNet50 is ~100MB)
pub const MAX_MODEL_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Named, versioned identity of the model artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Model name (e.g., "resnet50")
    pub name: String,
    /// Weights version (e.g., "imagenet-1k")
    pub version: String,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            name: "resnet50".to_string(),
            version: "imagenet-1k".to_string(),
        }
    }
}

/// Configuration for loading the classification model
#[derive(Debug, Clone)]
pub struct ModelLoadConfig {
    pub spec: ModelSpec,
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Download source used when `model_path` does not exist
    pub model_url: Option<String>,
    /// Expected SHA-256 (hex) of the model file
    pub model_sha256: Option<String>,
    /// Path to the taxonomy file
    pub labels_path: PathBuf,
    pub input_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    pub apply_softmax: bool,
    pub intra_threads: usize,
    /// Upper bound on simultaneous forward passes
    pub max_concurrent_inferences: usize,
}

impl Default for ModelLoadConfig {
    fn default() -> Self {
        Self {
            spec: ModelSpec::default(),
            model_path: PathBuf::from("./models/resnet50-imagenet.onnx"),
            model_url: None,
            model_sha256: None,
            labels_path: PathBuf::from("./models/imagenet_class_index.json"),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            normalization: Normalization::Caffe,
            apply_softmax: false,
            intra_threads: 4,
            max_concurrent_inferences: 1,
        }
    }
}

/// Process-wide, read-only model handle
///
/// Built once before serving and shared via `Arc` by every pipeline. There is
/// no mutation path after construction; concurrent forward passes are bounded
/// by the inference gate.
pub struct ClassificationModel {
    spec: ModelSpec,
    classifier: Arc<dyn ImageClassifier>,
    taxonomy: Arc<Taxonomy>,
    preprocessor: Preprocessor,
    inference_gate: Arc<Semaphore>,
    max_concurrent_inferences: usize,
}

impl std::fmt::Debug for ClassificationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationModel")
            .field("spec", &self.spec)
            .field("num_classes", &self.taxonomy.len())
            .field("preprocessor", &self.preprocessor)
            .field("max_concurrent_inferences", &self.max_concurrent_inferences)
            .finish_non_exhaustive()
    }
}

impl ClassificationModel {
    /// Assemble a model handle from already loaded parts
    pub fn new(
        spec: ModelSpec,
        classifier: Arc<dyn ImageClassifier>,
        taxonomy: Taxonomy,
        preprocessor: Preprocessor,
        max_concurrent_inferences: usize,
    ) -> Result<Self> {
        if classifier.num_classes() != taxonomy.len() {
            anyhow::bail!(
                "Classifier outputs {} classes but taxonomy has {} labels",
                classifier.num_classes(),
                taxonomy.len()
            );
        }
        if max_concurrent_inferences == 0 {
            anyhow::bail!("max_concurrent_inferences must be at least 1");
        }

        Ok(Self {
            spec,
            classifier,
            taxonomy: Arc::new(taxonomy),
            preprocessor,
            inference_gate: Arc::new(Semaphore::new(max_concurrent_inferences)),
            max_concurrent_inferences,
        })
    }

    /// Load taxonomy and ONNX weights from disk, downloading the weights if needed
    pub async fn load(config: ModelLoadConfig) -> Result<Self> {
        info!(
            "🧠 Loading {} ({}) from {}",
            config.spec.name,
            config.spec.version,
            config.model_path.display()
        );

        ensure_model_file(
            &config.model_path,
            config.model_url.as_deref(),
            config.model_sha256.as_deref(),
        )
        .await?;

        let taxonomy = Taxonomy::load(&config.labels_path)?;

        let preprocessor = Preprocessor::new(PreprocessConfig {
            input_size: config.input_size,
            layout: config.layout,
            normalization: config.normalization,
        })?;

        let classifier_config = OnnxClassifierConfig {
            num_classes: taxonomy.len(),
            input_size: config.input_size as usize,
            layout: config.layout,
            apply_softmax: config.apply_softmax,
            intra_threads: config.intra_threads,
        };
        let model_path = config.model_path.clone();
        let classifier = tokio::task::spawn_blocking(move || {
            OnnxClassifier::new(model_path, classifier_config)
        })
        .await
        .context("Classifier loading task panicked")??;

        let model = Self::new(
            config.spec,
            Arc::new(classifier),
            taxonomy,
            preprocessor,
            config.max_concurrent_inferences,
        )?;

        info!("✅ AI model loaded successfully: {:?}", model);
        Ok(model)
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn num_classes(&self) -> usize {
        self.taxonomy.len()
    }

    pub fn max_concurrent_inferences(&self) -> usize {
        self.max_concurrent_inferences
    }

    /// Run one forward pass on the blocking pool, gated by the inference semaphore
    ///
    /// The permit moves into the blocking task, so a caller that stops waiting
    /// does not free the slot before the forward pass ends.
    pub async fn infer(&self, input: ModelInput) -> Result<Vec<f32>, InferenceError> {
        let permit = Arc::clone(&self.inference_gate)
            .acquire_owned()
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))?;

        let classifier = Arc::clone(&self.classifier);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            classifier.classify(&input)
        })
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))?
    }
}

/// Make sure the model file exists, downloading it when a URL is configured
pub async fn ensure_model_file(
    path: &Path,
    url: Option<&str>,
    expected_sha256: Option<&str>,
) -> Result<()> {
    if path.exists() {
        debug!("Model file already present at {}", path.display());
    } else {
        let url = url.ok_or_else(|| {
            anyhow::anyhow!(
                "Model file {} not found and no download URL configured",
                path.display()
            )
        })?;
        let size = download_model(url, path, MAX_MODEL_DOWNLOAD_SIZE).await?;
        info!("✅ Downloaded model ({} bytes) to {}", size, path.display());
    }

    if let Some(expected) = expected_sha256 {
        let actual = file_sha256(path).await?;
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!(
                "Model checksum mismatch for {}: expected {}, got {}",
                path.display(),
                expected,
                actual
            );
        }
        debug!("Model checksum verified: {}", actual);
    }

    Ok(())
}

async fn download_model(url: &str, path: &Path, max_size: u64) -> Result<u64> {
    info!("📥 Downloading model from {}...", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(600))
        .build()?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to request model from {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Model download failed: HTTP {}", response.status());
    }

    if let Some(len) = response.content_length() {
        if len > max_size {
            anyhow::bail!("Model too large: {} bytes (limit {})", len, max_size);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Stream into a sibling temp file; a failed download never leaves a partial model
    let tmp_path = path.with_extension("download");
    let written = match write_body(response, &tmp_path, max_size).await {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        warn!("⚠️ Failed to move downloaded model into place: {}", e);
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }

    Ok(written)
}

async fn write_body(response: reqwest::Response, tmp_path: &Path, max_size: u64) -> Result<u64> {
    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read model body")?;
        written += chunk.len() as u64;
        if written > max_size {
            anyhow::bail!("Model too large: more than {} bytes", max_size);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(written)
}

async fn file_sha256(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
