// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Notification sink: how the pipeline talks back to the requester
//!
//! A request produces an interim message and later replaces it with the
//! terminal one, so the requester sees a single evolving status.

use async_trait::async_trait;
use thiserror::Error;

/// Identifies a message previously sent through a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i64);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Message {0:?} cannot be updated")]
    NotUpdatable(MessageHandle),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send a new message
    async fn notify(&self, text: &str) -> Result<MessageHandle, NotifyError>;

    /// Replace the text of a message sent earlier
    async fn update(&self, handle: &MessageHandle, text: &str) -> Result<(), NotifyError>;
}
