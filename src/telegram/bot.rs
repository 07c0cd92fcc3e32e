// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Long-polling chat front end
//!
//! Each photo becomes an independent pipeline run in its own task, so a slow
//! classification in one chat never holds up another.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::{largest_photo, PhotoCandidate, TelegramFileFetcher};
use super::messages::{HELP_MESSAGE, SEND_PHOTO_PROMPT, WELCOME_MESSAGE};
use super::sink::TelegramSink;
use crate::pipeline::{ClassificationPipeline, FetchConfig, PipelineConfig};
use crate::vision::ClassificationModel;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "welcome message")]
    Start,
    #[command(description = "how to use this bot")]
    Help,
}

/// What an incoming chat message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Command(Command),
    Photo(PhotoCandidate),
    Other,
}

/// Photos win over text; unknown commands and plain text fall through to `Other`
pub fn route_message(text: Option<&str>, photos: &[PhotoCandidate], bot_name: &str) -> Incoming {
    if let Some(photo) = largest_photo(photos) {
        return Incoming::Photo(photo.clone());
    }

    match text.map(|t| Command::parse(t, bot_name)) {
        Some(Ok(command)) => Incoming::Command(command),
        _ => Incoming::Other,
    }
}

struct BotState {
    pipeline: ClassificationPipeline,
    bot_name: String,
    shutdown: CancellationToken,
}

impl BotState {
    async fn handle_message(&self, bot: Bot, msg: Message) {
        if msg.from.as_ref().is_some_and(|u| u.is_bot) {
            return;
        }

        let photos: Vec<PhotoCandidate> = msg
            .photo()
            .map(|sizes| sizes.iter().map(PhotoCandidate::from).collect())
            .unwrap_or_default();

        match route_message(msg.text(), &photos, &self.bot_name) {
            Incoming::Command(Command::Start) => {
                reply_markdown(&bot, msg.chat.id, WELCOME_MESSAGE).await;
            }
            Incoming::Command(Command::Help) => {
                reply_markdown(&bot, msg.chat.id, HELP_MESSAGE).await;
            }
            Incoming::Photo(photo) => {
                debug!(
                    "Photo from chat {}: {}x{} ({} bytes)",
                    msg.chat.id, photo.width, photo.height, photo.file_size
                );
                self.spawn_classification(bot, msg.chat.id, photo.file_id);
            }
            Incoming::Other => {
                if let Err(e) = bot.send_message(msg.chat.id, SEND_PHOTO_PROMPT).await {
                    warn!("Failed to send prompt to chat {}: {}", msg.chat.id, e);
                }
            }
        }
    }

    fn spawn_classification(&self, bot: Bot, chat_id: ChatId, file_id: String) {
        let pipeline = self.pipeline.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let sink = TelegramSink::new(bot, chat_id);
            let outcome = pipeline.run(&file_id, &sink, &cancel).await;
            info!(
                "[{}] chat {} finished as {} in {:?}",
                outcome.request_id, chat_id, outcome.final_state, outcome.elapsed
            );
        });
    }
}

#[allow(deprecated)]
async fn reply_markdown(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Markdown)
        .await
    {
        warn!("Failed to send message to chat {}: {}", chat_id, e);
    }
}

/// Telegram front end for the classification pipeline
pub struct TelegramBot {
    bot: Bot,
    pipeline: ClassificationPipeline,
}

impl TelegramBot {
    pub fn new(
        token: &str,
        model: Arc<ClassificationModel>,
        fetch_config: FetchConfig,
        pipeline_config: PipelineConfig,
    ) -> anyhow::Result<Self> {
        let bot = Bot::new(token);
        let fetcher = TelegramFileFetcher::new(bot.clone(), fetch_config)?;
        let pipeline = ClassificationPipeline::new(model, Arc::new(fetcher), pipeline_config);
        Ok(Self { bot, pipeline })
    }

    /// Poll for updates until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let me = self.bot.get_me().await?;
        let bot_name = me.username.clone().unwrap_or_default();
        info!("🚀 Telegram bot @{} is starting...", bot_name);

        let state = Arc::new(BotState {
            pipeline: self.pipeline,
            bot_name,
            shutdown: shutdown.clone(),
        });

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let state = Arc::clone(&state);
            async move {
                state.handle_message(bot, msg).await;
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(self.bot, handler).build();
        let shutdown_token = dispatcher.shutdown_token();

        info!("✅ Bot ready! Send photos for AI classification! Commands: /start, /help");

        tokio::select! {
            _ = dispatcher.dispatch() => {}
            _ = shutdown.cancelled() => {
                info!("🛑 Stopping Telegram polling");
                shutdown_token.shutdown().ok();
            }
        }

        Ok(())
    }
}
