// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request pipeline: fetch, decode, preprocess, infer, rank, format, deliver
//!
//! Transport adapters (Telegram, HTTP) supply an [`ImageFetcher`] and a
//! [`NotificationSink`]; everything between those seams lives here.

pub mod errors;
pub mod fetcher;
pub mod notifier;
pub mod orchestrator;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;
pub mod report;
pub mod state;

pub use errors::PipelineError;
pub use fetcher::{download_bytes, FetchConfig, FetchError, HttpImageFetcher, ImageFetcher};
pub use notifier::{MessageHandle, NotificationSink, NotifyError};
pub use orchestrator::{ClassificationPipeline, PipelineConfig, PipelineOutcome};
#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordingSink, SinkEvent};
pub use report::{
    failure_message, format_report, humanize_label, ClassificationReport, PROCESSING_MESSAGE,
};
pub use state::{ErrorKind, RequestState, Stage, StateTracker};
