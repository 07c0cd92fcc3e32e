// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Drives one classification request through every stage
//!
//! Stages run strictly in order for a request. Decode and preprocess run on
//! the blocking pool, inference goes through the model's gate, and every
//! stage races the request's cancellation token. Once cancelled, nothing
//! more is sent to the sink.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::PipelineError;
use super::fetcher::ImageFetcher;
use super::notifier::{MessageHandle, NotificationSink};
use super::report::{format_report, ClassificationReport, PROCESSING_MESSAGE};
use super::state::{RequestState, Stage, StateTracker};
use crate::vision::{
    decode_image_bytes, rank_predictions, ClassificationModel, DecodeError, PreprocessError,
    DEFAULT_TOP_K,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of predictions included in a report
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// What happened to a request
#[derive(Debug)]
pub struct PipelineOutcome {
    pub request_id: String,
    pub final_state: RequestState,
    pub history: Vec<RequestState>,
    pub report: Option<ClassificationReport>,
    pub error: Option<PipelineError>,
    pub elapsed: Duration,
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        self.final_state == RequestState::Delivered
    }

    /// Whether the request ever reached `stage`
    pub fn visited(&self, stage: Stage) -> bool {
        self.history
            .iter()
            .any(|state| matches!(state, RequestState::Active { stage: s } if *s == stage))
    }
}

enum Interrupt {
    Cancelled,
    Failed(PipelineError),
}

impl From<PipelineError> for Interrupt {
    fn from(err: PipelineError) -> Self {
        Interrupt::Failed(err)
    }
}

/// Run `fut` unless the token fires first
async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, Interrupt>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        result = fut => result.map_err(Interrupt::Failed),
    }
}

#[derive(Clone)]
pub struct ClassificationPipeline {
    model: Arc<ClassificationModel>,
    fetcher: Arc<dyn ImageFetcher>,
    config: PipelineConfig,
}

impl ClassificationPipeline {
    pub fn new(
        model: Arc<ClassificationModel>,
        fetcher: Arc<dyn ImageFetcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            model,
            fetcher,
            config,
        }
    }

    pub fn model(&self) -> &Arc<ClassificationModel> {
        &self.model
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one request end to end, reporting progress through `sink`
    ///
    /// Sends one interim message on entering FETCHING and exactly one
    /// terminal message (report or failure text), unless cancelled first.
    pub async fn run(
        &self,
        reference: &str,
        sink: &dyn NotificationSink,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut tracker = StateTracker::new();

        info!("📸 [{}] Classification request received", request_id);

        if cancel.is_cancelled() {
            tracker.cancel();
            return Self::finish(request_id, tracker, None, None, started);
        }

        tracker.enter(Stage::Fetching);
        let interim = match sink.notify(PROCESSING_MESSAGE).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("[{}] Could not send processing message: {}", request_id, e);
                None
            }
        };

        let result = self
            .process(reference, &mut tracker, cancel, self.config.top_k)
            .await;

        // A cancellation that lands after the last stage still suppresses delivery
        let result = match result {
            Ok(_) if cancel.is_cancelled() => Err(Interrupt::Cancelled),
            other => other,
        };

        match result {
            Ok(report) => {
                let text = format_report(&report);
                Self::deliver(&request_id, sink, interim, &text).await;
                tracker.transition(RequestState::Delivered);
                info!(
                    "✅ [{}] Classification delivered in {:?}",
                    request_id,
                    started.elapsed()
                );
                Self::finish(request_id, tracker, Some(report), None, started)
            }
            Err(Interrupt::Failed(err)) => {
                error!(
                    "❌ [{}] Pipeline failed at {}: {}",
                    request_id,
                    tracker.stage(),
                    err
                );
                tracker.fail(err.kind());
                Self::deliver(&request_id, sink, interim, err.user_message()).await;
                Self::finish(request_id, tracker, None, Some(err), started)
            }
            Err(Interrupt::Cancelled) => {
                info!(
                    "🚫 [{}] Request cancelled at {}, dropping notifications",
                    request_id,
                    tracker.stage()
                );
                tracker.cancel();
                Self::finish(request_id, tracker, None, None, started)
            }
        }
    }

    /// Classify bytes that are already in hand (no fetch, no notifications)
    pub async fn classify_bytes(
        &self,
        bytes: Bytes,
        top_k: Option<usize>,
    ) -> Result<ClassificationReport, PipelineError> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let mut tracker = StateTracker::new();
        tracker.enter(Stage::Fetching);
        tracker.enter(Stage::Decoding);
        self.analyze(bytes, &mut tracker, &CancellationToken::new(), top_k)
            .await
            .map_err(|interrupt| match interrupt {
                Interrupt::Failed(err) => err,
                // The token above is private and never cancelled
                Interrupt::Cancelled => {
                    PipelineError::Decode(DecodeError::DecodeFailed("cancelled".to_string()))
                }
            })
    }

    /// Fetch and classify `reference` without notifications or cancellation
    pub async fn classify_reference(
        &self,
        reference: &str,
        top_k: Option<usize>,
    ) -> Result<ClassificationReport, PipelineError> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let bytes = self.fetcher.fetch(reference).await?;
        self.classify_bytes(bytes, Some(top_k)).await
    }

    async fn process(
        &self,
        reference: &str,
        tracker: &mut StateTracker,
        cancel: &CancellationToken,
        top_k: usize,
    ) -> Result<ClassificationReport, Interrupt> {
        let bytes = guarded(cancel, async {
            self.fetcher
                .fetch(reference)
                .await
                .map_err(PipelineError::from)
        })
        .await?;
        debug!("Fetched {} bytes", bytes.len());

        tracker.enter(Stage::Decoding);
        self.analyze(bytes, tracker, cancel, top_k).await
    }

    /// Decode through formatting; the tracker must already be in DECODING
    async fn analyze(
        &self,
        bytes: Bytes,
        tracker: &mut StateTracker,
        cancel: &CancellationToken,
        top_k: usize,
    ) -> Result<ClassificationReport, Interrupt> {
        let decoded = guarded(cancel, async move {
            tokio::task::spawn_blocking(move || decode_image_bytes(&bytes))
                .await
                .map_err(|e| DecodeError::DecodeFailed(format!("decoder task failed: {}", e)))?
                .map_err(PipelineError::from)
        })
        .await?;
        let info = decoded.info.clone();
        debug!(
            "Decoded {}x{} {} image",
            info.width, info.height, info.format
        );

        tracker.enter(Stage::Preprocessing);
        let preprocessor = *self.model.preprocessor();
        let input = guarded(cancel, async move {
            tokio::task::spawn_blocking(move || preprocessor.preprocess(&decoded))
                .await
                .map_err(|e| PreprocessError::Worker(e.to_string()))?
                .map_err(PipelineError::from)
        })
        .await?;

        tracker.enter(Stage::Inferring);
        let model = Arc::clone(&self.model);
        let scores = guarded(cancel, async move {
            model.infer(input).await.map_err(PipelineError::from)
        })
        .await?;

        tracker.enter(Stage::Ranking);
        let predictions = rank_predictions(&scores, self.model.taxonomy(), top_k)
            .map_err(PipelineError::from)?;

        tracker.enter(Stage::Formatting);
        Ok(ClassificationReport::new(info, predictions))
    }

    /// Replace the interim message; send a fresh one when that is not possible
    async fn deliver(
        request_id: &str,
        sink: &dyn NotificationSink,
        interim: Option<MessageHandle>,
        text: &str,
    ) {
        if let Some(handle) = interim {
            match sink.update(&handle, text).await {
                Ok(()) => return,
                Err(e) => warn!(
                    "[{}] Could not update processing message, sending a new one: {}",
                    request_id, e
                ),
            }
        }

        if let Err(e) = sink.notify(text).await {
            error!("[{}] Failed to deliver terminal message: {}", request_id, e);
        }
    }

    fn finish(
        request_id: String,
        tracker: StateTracker,
        report: Option<ClassificationReport>,
        error: Option<PipelineError>,
        started: Instant,
    ) -> PipelineOutcome {
        PipelineOutcome {
            request_id,
            final_state: tracker.current(),
            history: tracker.into_history(),
            report,
            error,
            elapsed: started.elapsed(),
        }
    }
}
