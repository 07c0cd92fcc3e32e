// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration: command-line flags with environment fallbacks

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use crate::pipeline::{FetchConfig, HttpImageFetcher, PipelineConfig};
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::{ModelLoadConfig, ModelSpec, Normalization, TensorLayout, DEFAULT_TOP_K};

/// Smallest input edge the preprocessor is allowed to produce
pub const MIN_INPUT_SIZE: u32 = 32;

/// Fabstir Image Classifier node
#[derive(Parser, Debug, Clone)]
#[command(name = "fabstir-image-classifier")]
#[command(version)]
#[command(about = "Classifies photos sent over Telegram or HTTP with a pretrained ResNet50", long_about = None)]
pub struct AppConfig {
    /// Telegram bot token; the chat front end is disabled without it
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// ONNX model file
    #[arg(long, env = "MODEL_PATH", default_value = "./models/resnet50-imagenet.onnx")]
    pub model_path: PathBuf,

    #[arg(long, env = "MODEL_NAME", default_value = "resnet50")]
    pub model_name: String,

    #[arg(long, env = "MODEL_VERSION", default_value = "imagenet-1k")]
    pub model_version: String,

    /// Where to download the model from when MODEL_PATH is missing
    #[arg(long, env = "MODEL_URL")]
    pub model_url: Option<String>,

    /// Expected SHA-256 of the model file (hex)
    #[arg(long, env = "MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Class index file (Keras JSON or one label per line)
    #[arg(long, env = "LABELS_PATH", default_value = "./models/imagenet_class_index.json")]
    pub labels_path: PathBuf,

    #[arg(long, env = "TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long, env = "INPUT_SIZE", default_value_t = 224)]
    pub input_size: u32,

    #[arg(long, env = "NORMALIZATION", value_enum, default_value = "caffe")]
    pub normalization: Normalization,

    #[arg(long, env = "TENSOR_LAYOUT", value_enum, default_value = "nhwc")]
    pub tensor_layout: TensorLayout,

    /// Apply softmax to model outputs (for exports ending in logits)
    #[arg(long, env = "SOFTMAX", default_value_t = false)]
    pub softmax: bool,

    #[arg(long, env = "MAX_CONCURRENT_INFERENCES", default_value_t = 1)]
    pub max_concurrent_inferences: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = MAX_IMAGE_SIZE)]
    pub max_image_bytes: usize,

    /// Let `/v1/classify` fetch URLs on loopback and private networks
    #[arg(long, env = "ALLOW_PRIVATE_IMAGE_HOSTS", default_value_t = false)]
    pub allow_private_image_hosts: bool,

    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub api_host: IpAddr,

    /// HTTP API port; the API is disabled without it
    #[arg(long, env = "API_PORT")]
    pub api_port: Option<u16>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.telegram_bot_token.as_deref().map_or(true, str::is_empty)
            && self.api_port.is_none()
        {
            bail!("Nothing to serve: set TELEGRAM_BOT_TOKEN and/or API_PORT");
        }
        if self.top_k == 0 {
            bail!("TOP_K must be at least 1");
        }
        if self.max_concurrent_inferences == 0 {
            bail!("MAX_CONCURRENT_INFERENCES must be at least 1");
        }
        if self.input_size < MIN_INPUT_SIZE {
            bail!(
                "INPUT_SIZE must be at least {}, got {}",
                MIN_INPUT_SIZE,
                self.input_size
            );
        }
        if self.intra_threads == 0 {
            bail!("INTRA_THREADS must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("FETCH_TIMEOUT_SECS must be at least 1");
        }
        if self.max_image_bytes == 0 || self.max_image_bytes > MAX_IMAGE_SIZE {
            bail!(
                "MAX_IMAGE_BYTES must be between 1 and {}",
                MAX_IMAGE_SIZE
            );
        }
        Ok(())
    }

    pub fn model_load_config(&self) -> ModelLoadConfig {
        ModelLoadConfig {
            spec: ModelSpec {
                name: self.model_name.clone(),
                version: self.model_version.clone(),
            },
            model_path: self.model_path.clone(),
            model_url: self.model_url.clone(),
            model_sha256: self.model_sha256.clone(),
            labels_path: self.labels_path.clone(),
            input_size: self.input_size,
            layout: self.tensor_layout,
            normalization: self.normalization,
            apply_softmax: self.softmax,
            intra_threads: self.intra_threads,
            max_concurrent_inferences: self.max_concurrent_inferences,
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_image_bytes,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig { top_k: self.top_k }
    }

    /// Fetcher for image URLs given to the HTTP API
    pub fn http_fetcher(&self) -> anyhow::Result<HttpImageFetcher> {
        if self.allow_private_image_hosts {
            HttpImageFetcher::allowing_private_hosts(self.fetch_config())
        } else {
            HttpImageFetcher::new(self.fetch_config())
        }
    }

    pub fn api_addr(&self) -> Option<SocketAddr> {
        self.api_port.map(|port| SocketAddr::new(self.api_host, port))
    }

    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram_bot_token.as_deref().filter(|t| !t.is_empty())
    }
}
