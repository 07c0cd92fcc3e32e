// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fakes and fixtures for the classification tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use fabstir_image_classifier::pipeline::{
    ClassificationPipeline, FetchError, ImageFetcher, PipelineConfig,
};
use fabstir_image_classifier::vision::{
    ClassificationModel, ImageClassifier, InferenceError, ModelInput, ModelSpec, PreprocessConfig,
    Preprocessor, Taxonomy,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const NUM_CLASSES: usize = 10;

pub fn labels() -> Vec<String> {
    vec![
        "tench",
        "goldfish",
        "great_white_shark",
        "tabby",
        "tiger_cat",
        "Persian_cat",
        "golden_retriever",
        "German_shepherd",
        "jack-o'-lantern",
        "espresso",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn taxonomy() -> Taxonomy {
    Taxonomy::from_labels(labels()).unwrap()
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&solid_rgb(width, height, [180, 90, 30]), ImageFormat::Png)
}

/// Valid PNG header followed by garbage
pub fn corrupt_png() -> Vec<u8> {
    let mut bytes = png_bytes(32, 32);
    bytes.truncate(40);
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    bytes
}

/// Scores for a distribution peaked on `class`
pub fn peaked_scores(class: usize) -> Vec<f32> {
    let mut scores = vec![0.02; NUM_CLASSES];
    scores[class] = 1.0 - 0.02 * (NUM_CLASSES as f32 - 1.0);
    scores
}

/// Classifier with fixed output that records call count and peak overlap
pub struct StubClassifier {
    scores: Vec<f32>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubClassifier {
    pub fn new(scores: Vec<f32>) -> Self {
        Self::with_delay(scores, Duration::ZERO)
    }

    pub fn with_delay(scores: Vec<f32>, delay: Duration) -> Self {
        Self {
            scores,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ImageClassifier for StubClassifier {
    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn classify(&self, _input: &ModelInput) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

/// Classifier that always fails inside the engine
pub struct FailingClassifier;

impl ImageClassifier for FailingClassifier {
    fn num_classes(&self) -> usize {
        NUM_CLASSES
    }

    fn classify(&self, _input: &ModelInput) -> Result<Vec<f32>, InferenceError> {
        Err(InferenceError::Engine("onnx runtime error 0x2a".to_string()))
    }
}

/// Serves canned bytes per reference, optionally after a delay
#[derive(Default)]
pub struct StaticFetcher {
    images: HashMap<String, Bytes>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(reference.to_string(), Bytes::from(bytes));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| FetchError::NotAccessible(reference.to_string()))
    }
}

/// Never answers within its timeout
pub struct TimeoutFetcher {
    pub timeout: Duration,
}

#[async_trait]
impl ImageFetcher for TimeoutFetcher {
    async fn fetch(&self, _reference: &str) -> Result<Bytes, FetchError> {
        tokio::time::sleep(self.timeout).await;
        Err(FetchError::Timeout(self.timeout))
    }
}

pub fn small_preprocessor() -> Preprocessor {
    Preprocessor::new(PreprocessConfig {
        input_size: 32,
        ..PreprocessConfig::default()
    })
    .unwrap()
}

pub fn model_with(
    classifier: Arc<dyn ImageClassifier>,
    max_concurrent: usize,
) -> Arc<ClassificationModel> {
    Arc::new(
        ClassificationModel::new(
            ModelSpec::default(),
            classifier,
            taxonomy(),
            small_preprocessor(),
            max_concurrent,
        )
        .unwrap(),
    )
}

pub fn pipeline_with(
    model: Arc<ClassificationModel>,
    fetcher: Arc<dyn ImageFetcher>,
) -> ClassificationPipeline {
    ClassificationPipeline::new(model, fetcher, PipelineConfig::default())
}
