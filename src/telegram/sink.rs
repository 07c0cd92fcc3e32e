// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::RequestError;
use tracing::debug;

use crate::pipeline::{MessageHandle, NotificationSink, NotifyError};

/// Sends and edits messages in a single chat
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

fn to_notify_error(err: RequestError) -> NotifyError {
    NotifyError::Transport(err.to_string())
}

#[async_trait]
impl NotificationSink for TelegramSink {
    #[allow(deprecated)]
    async fn notify(&self, text: &str) -> Result<MessageHandle, NotifyError> {
        let sent = match self
            .bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Markdown)
            .await
        {
            Ok(message) => message,
            Err(RequestError::Api(api_err)) => {
                // Usually unbalanced markup in a label; resend as plain text
                debug!("Markdown rejected ({}), resending as plain text", api_err);
                self.bot
                    .send_message(self.chat_id, text)
                    .await
                    .map_err(to_notify_error)?
            }
            Err(e) => return Err(to_notify_error(e)),
        };

        Ok(MessageHandle(i64::from(sent.id.0)))
    }

    #[allow(deprecated)]
    async fn update(&self, handle: &MessageHandle, text: &str) -> Result<(), NotifyError> {
        let message_id = i32::try_from(handle.0)
            .map(MessageId)
            .map_err(|_| NotifyError::NotUpdatable(*handle))?;

        match self
            .bot
            .edit_message_text(self.chat_id, message_id, text)
            .parse_mode(ParseMode::Markdown)
            .await
        {
            Ok(_) => Ok(()),
            Err(RequestError::Api(api_err)) => {
                debug!("Edit with Markdown rejected ({}), retrying as plain text", api_err);
                self.bot
                    .edit_message_text(self.chat_id, message_id, text)
                    .await
                    .map(|_| ())
                    .map_err(to_notify_error)
            }
            Err(e) => Err(to_notify_error(e)),
        }
    }
}
