// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classify request types and validation

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Largest top-K a caller may ask for
pub const MAX_TOP_K: usize = 20;

/// Base64 inflates by 4/3
const MAX_ENCODED_IMAGE_SIZE: usize = MAX_IMAGE_SIZE / 3 * 4 + 4;

/// Request for image classification; exactly one of `image` or `url`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    /// Base64-encoded image data, optionally as a `data:` URL
    #[serde(default)]
    pub image: Option<String>,

    /// http(s) URL to fetch the image from
    #[serde(default)]
    pub url: Option<String>,

    /// Number of predictions to return (1-20, default from config)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl ClassifyRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let has_image = self.image.as_deref().is_some_and(|s| !s.is_empty());
        let has_url = self.url.as_deref().is_some_and(|s| !s.is_empty());

        match (has_image, has_url) {
            (false, false) => {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: "one of image or url is required".to_string(),
                })
            }
            (true, true) => {
                return Err(ApiError::ValidationError {
                    field: "url".to_string(),
                    message: "provide either image or url, not both".to_string(),
                })
            }
            _ => {}
        }

        if let Some(ref image) = self.image {
            if image.len() > MAX_ENCODED_IMAGE_SIZE {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: format!("image exceeds maximum size of {} bytes", MAX_IMAGE_SIZE),
                });
            }
        }

        if let Some(top_k) = self.top_k {
            if top_k == 0 || top_k > MAX_TOP_K {
                return Err(ApiError::ValidationError {
                    field: "topK".to_string(),
                    message: format!("topK must be between 1 and {}, got {}", MAX_TOP_K, top_k),
                });
            }
        }

        Ok(())
    }

    /// Decode the inline image, accepting a `data:image/...;base64,` prefix
    pub fn image_bytes(&self) -> Result<Option<Vec<u8>>, ApiError> {
        let Some(image) = self.image.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let payload = match image.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => image,
        };

        STANDARD
            .decode(payload.trim())
            .map(Some)
            .map_err(|e| ApiError::ValidationError {
                field: "image".to_string(),
                message: format!("image is not valid base64: {}", e),
            })
    }
}
