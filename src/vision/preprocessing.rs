// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the ResNet50 classifier
//!
//! The pretrained weights only classify well when the input is encoded
//! exactly the way they were trained: 224x224, three color channels and the
//! matching channel-wise normalization. Everything that feeds the classifier
//! goes through [`Preprocessor::preprocess`].

use clap::ValueEnum;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};
use thiserror::Error;

use super::image_utils::DecodedImage;

/// Target size for the ResNet50 input layer
pub const RESNET_INPUT_SIZE: u32 = 224;

/// Caffe-style per-channel means in BGR order (Keras `preprocess_input` for ResNet50)
pub const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// ImageNet normalization mean values (RGB, torchvision convention)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std values
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Errors raised on malformed decoded images
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image has zero dimensions ({0}x{1})")]
    ZeroDimensions(u32, u32),

    #[error("Image metadata ({meta_w}x{meta_h}) does not match pixel buffer ({pix_w}x{pix_h})")]
    DimensionMismatch {
        meta_w: u32,
        meta_h: u32,
        pix_w: u32,
        pix_h: u32,
    },

    #[error("Invalid target size {0}")]
    InvalidTargetSize(u32),

    #[error("Preprocessing worker failed: {0}")]
    Worker(String),
}

/// Memory layout of the model input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TensorLayout {
    /// [1, H, W, 3], the Keras/TensorFlow export layout
    #[default]
    Nhwc,
    /// [1, 3, H, W], the PyTorch export layout
    Nchw,
}

/// Numeric encoding applied to each pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Normalization {
    /// BGR channel order, per-channel mean subtraction, no scaling
    #[default]
    Caffe,
    /// RGB channel order, scaled to [0,1] then (x - mean) / std
    Imagenet,
}

impl Normalization {
    /// Encode one RGB pixel into the three channel values in model channel order
    pub fn encode(&self, rgb: [u8; 3]) -> [f32; 3] {
        match self {
            Self::Caffe => [
                rgb[2] as f32 - CAFFE_MEAN_BGR[0],
                rgb[1] as f32 - CAFFE_MEAN_BGR[1],
                rgb[0] as f32 - CAFFE_MEAN_BGR[2],
            ],
            Self::Imagenet => {
                let mut out = [0.0f32; 3];
                for c in 0..3 {
                    out[c] = (rgb[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
                out
            }
        }
    }

    /// Inclusive range every encoded value falls into
    pub fn value_range(&self) -> (f32, f32) {
        match self {
            Self::Caffe => (-CAFFE_MEAN_BGR[2], 255.0 - CAFFE_MEAN_BGR[0]),
            Self::Imagenet => {
                let lo = (0..3)
                    .map(|c| -IMAGENET_MEAN[c] / IMAGENET_STD[c])
                    .fold(f32::INFINITY, f32::min);
                let hi = (0..3)
                    .map(|c| (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
                    .fold(f32::NEG_INFINITY, f32::max);
                (lo, hi)
            }
        }
    }
}

/// Preprocessing settings matching the loaded model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
    pub input_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: RESNET_INPUT_SIZE,
            layout: TensorLayout::Nhwc,
            normalization: Normalization::Caffe,
        }
    }
}

/// Model-ready input tensor
///
/// Only the preprocessor can build one, so a `ModelInput` always has the
/// configured shape and value encoding.
#[derive(Debug, Clone)]
pub struct ModelInput {
    data: Array4<f32>,
    layout: TensorLayout,
}

impl ModelInput {
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Spatial size (height == width)
    pub fn spatial_size(&self) -> usize {
        match self.layout {
            TensorLayout::Nhwc => self.data.shape()[1],
            TensorLayout::Nchw => self.data.shape()[2],
        }
    }

    /// Number of color channels
    pub fn channels(&self) -> usize {
        match self.layout {
            TensorLayout::Nhwc => self.data.shape()[3],
            TensorLayout::Nchw => self.data.shape()[1],
        }
    }

    /// Value at (y, x, channel) regardless of layout
    pub fn value_at(&self, y: usize, x: usize, c: usize) -> f32 {
        match self.layout {
            TensorLayout::Nhwc => self.data[[0, y, x, c]],
            TensorLayout::Nchw => self.data[[0, c, y, x]],
        }
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Resizes and normalizes decoded images into [`ModelInput`] tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self, PreprocessError> {
        if config.input_size == 0 {
            return Err(PreprocessError::InvalidTargetSize(config.input_size));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Preprocess a decoded image
    ///
    /// Steps:
    /// 1. Resize to input_size x input_size (bicubic, aspect ratio not kept)
    /// 2. Convert to RGB (alpha dropped, grayscale replicated)
    /// 3. Encode each pixel with the configured normalization
    /// 4. Lay out as NHWC or NCHW with a batch axis of 1
    pub fn preprocess(&self, decoded: &DecodedImage) -> Result<ModelInput, PreprocessError> {
        let (pix_w, pix_h) = (decoded.pixels.width(), decoded.pixels.height());
        if decoded.info.width != pix_w || decoded.info.height != pix_h {
            return Err(PreprocessError::DimensionMismatch {
                meta_w: decoded.info.width,
                meta_h: decoded.info.height,
                pix_w,
                pix_h,
            });
        }
        self.preprocess_image(&decoded.pixels)
    }

    /// Preprocess a raw pixel buffer
    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<ModelInput, PreprocessError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PreprocessError::ZeroDimensions(image.width(), image.height()));
        }

        let size = self.config.input_size;
        let rgb = image
            .resize_exact(size, size, FilterType::CatmullRom)
            .to_rgb8();

        let size = size as usize;
        let mut data = match self.config.layout {
            TensorLayout::Nhwc => Array4::zeros((1, size, size, 3)),
            TensorLayout::Nchw => Array4::zeros((1, 3, size, size)),
        };

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let encoded = self.config.normalization.encode(pixel.0);
            let (x, y) = (x as usize, y as usize);
            for (c, value) in encoded.into_iter().enumerate() {
                match self.config.layout {
                    TensorLayout::Nhwc => data[[0, y, x, c]] = value,
                    TensorLayout::Nchw => data[[0, c, y, x]] = value,
                }
            }
        }

        Ok(ModelInput {
            data,
            layout: self.config.layout,
        })
    }
}
