// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Telegram chat adapter: photos in, classification reports out

pub mod bot;
pub mod fetcher;
pub mod messages;
pub mod sink;

pub use bot::{route_message, Command, Incoming, TelegramBot};
pub use fetcher::{file_download_url, largest_photo, PhotoCandidate, TelegramFileFetcher};
pub use sink::TelegramSink;
