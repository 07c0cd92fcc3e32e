// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory notification sink for tests (`test-util` feature)

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::notifier::{MessageHandle, NotificationSink, NotifyError};

/// One call made against a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Notified { handle: MessageHandle, text: String },
    Updated { handle: MessageHandle, text: String },
}

/// In-memory sink that records every call
///
/// Can be told to reject updates or notifications to exercise the
/// pipeline's fallback path.
#[derive(Debug, Default)]
pub struct RecordingSink {
    next_id: AtomicI64,
    events: Mutex<Vec<SinkEvent>>,
    reject_updates: bool,
    reject_notifications: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `update` always fails
    pub fn rejecting_updates() -> Self {
        Self {
            reject_updates: true,
            ..Self::default()
        }
    }

    /// A sink whose `notify` always fails
    pub fn rejecting_notifications() -> Self {
        Self {
            reject_notifications: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Texts in delivery order
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| match event {
                SinkEvent::Notified { text, .. } | SinkEvent::Updated { text, .. } => text,
            })
            .collect()
    }

    pub fn notify_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Notified { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Updated { .. }))
            .count()
    }

    fn record(&self, event: SinkEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("event log poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, text: &str) -> Result<MessageHandle, NotifyError> {
        if self.reject_notifications {
            return Err(NotifyError::Transport("notifications disabled".to_string()));
        }
        let handle = MessageHandle(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(SinkEvent::Notified {
            handle,
            text: text.to_string(),
        })?;
        Ok(handle)
    }

    async fn update(&self, handle: &MessageHandle, text: &str) -> Result<(), NotifyError> {
        if self.reject_updates {
            return Err(NotifyError::NotUpdatable(*handle));
        }
        self.record(SinkEvent::Updated {
            handle: *handle,
            text: text.to_string(),
        })
    }
}
