// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resolves Telegram file ids to image bytes

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use teloxide::prelude::*;
use teloxide::types::{FileId, PhotoSize};
use tracing::debug;

use crate::pipeline::{download_bytes, FetchConfig, FetchError, ImageFetcher};

/// One size variant of an uploaded photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCandidate {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u32,
}

impl From<&PhotoSize> for PhotoCandidate {
    fn from(size: &PhotoSize) -> Self {
        Self {
            file_id: size.file.id.to_string(),
            width: size.width,
            height: size.height,
            file_size: size.file.size,
        }
    }
}

/// Pick the largest variant by pixel count; later entries win ties
pub fn largest_photo(sizes: &[PhotoCandidate]) -> Option<&PhotoCandidate> {
    sizes
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
}

/// Download URL for a path returned by `getFile`
pub fn file_download_url(api_url: &str, token: &str, file_path: &str) -> String {
    format!(
        "{}/file/bot{}/{}",
        api_url.trim_end_matches('/'),
        token,
        file_path.trim_start_matches('/')
    )
}

/// Fetches photos by Telegram file id
#[derive(Clone)]
pub struct TelegramFileFetcher {
    bot: Bot,
    client: Client,
    config: FetchConfig,
}

impl TelegramFileFetcher {
    pub fn new(bot: Bot, config: FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            bot,
            client,
            config,
        })
    }
}

#[async_trait]
impl ImageFetcher for TelegramFileFetcher {
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError> {
        if reference.is_empty() {
            return Err(FetchError::InvalidReference("empty file id".to_string()));
        }

        let file = tokio::time::timeout(
            self.config.timeout,
            self.bot.get_file(FileId(reference.to_string())),
        )
        .await
        .map_err(|_| FetchError::Timeout(self.config.timeout))?
        .map_err(|e| FetchError::NotAccessible(e.to_string()))?;

        if file.path.is_empty() {
            return Err(FetchError::NotAccessible(format!(
                "no download path for file {}",
                reference
            )));
        }

        if file.meta.size as usize > self.config.max_bytes {
            return Err(FetchError::TooLarge(self.config.max_bytes));
        }

        debug!("📥 Downloading Telegram file: {}", file.path);
        let url = file_download_url(self.bot.api_url().as_str(), self.bot.token(), &file.path);
        download_bytes(&self.client, &url, &self.config).await
    }
}
