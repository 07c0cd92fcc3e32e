// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline state machine and notification behaviour
//!
//! Every run must end in exactly one terminal message that replaces the
//! interim one, and a failure must stop the pipeline at the failing stage.

use super::common::*;
use fabstir_image_classifier::pipeline::{
    ErrorKind, PipelineError, RecordingSink, RequestState, SinkEvent, Stage, PROCESSING_MESSAGE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_successful_run_walks_every_stage() {
    let classifier = Arc::new(StubClassifier::new(peaked_scores(3)));
    let fetcher = Arc::new(StaticFetcher::new().with("cat", png_bytes(120, 80)));
    let pipeline = pipeline_with(model_with(classifier.clone(), 1), fetcher);
    let sink = RecordingSink::new();

    let outcome = pipeline.run("cat", &sink, &CancellationToken::new()).await;

    assert_eq!(
        outcome.history,
        vec![
            RequestState::RECEIVED,
            RequestState::active(Stage::Fetching),
            RequestState::active(Stage::Decoding),
            RequestState::active(Stage::Preprocessing),
            RequestState::active(Stage::Inferring),
            RequestState::active(Stage::Ranking),
            RequestState::active(Stage::Formatting),
            RequestState::Delivered,
        ]
    );
    assert_eq!(classifier.calls(), 1);

    let report = outcome.report.expect("delivered run carries a report");
    assert_eq!(report.image().width, 120);
    assert_eq!(report.predictions().len(), 5);
    assert_eq!(report.predictions().top().unwrap().label, "tabby");

    let events = sink.events();
    assert_eq!(events.len(), 2);
    let interim = match &events[0] {
        SinkEvent::Notified { handle, text } => {
            assert_eq!(text, PROCESSING_MESSAGE);
            *handle
        }
        other => panic!("expected interim notify, got {:?}", other),
    };
    match &events[1] {
        SinkEvent::Updated { handle, text } => {
            assert_eq!(*handle, interim);
            assert!(text.contains("✨ **Best guess:** Tabby"));
        }
        other => panic!("expected terminal update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_bytes_fail_at_decoding() {
    let classifier = Arc::new(StubClassifier::new(peaked_scores(0)));
    let fetcher = Arc::new(StaticFetcher::new().with("broken", corrupt_png()));
    let pipeline = pipeline_with(model_with(classifier.clone(), 1), fetcher);
    let sink = RecordingSink::new();

    let outcome = pipeline
        .run("broken", &sink, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome.final_state,
        RequestState::Failed {
            stage: Stage::Decoding,
            kind: ErrorKind::Decode
        }
    );
    assert!(matches!(outcome.error, Some(PipelineError::Decode(_))));
    assert!(!outcome.visited(Stage::Preprocessing));
    assert_eq!(classifier.calls(), 0);

    // One interim plus exactly one terminal failure message
    assert_eq!(sink.notify_count(), 1);
    assert_eq!(sink.update_count(), 1);
    assert!(sink.texts()[1].starts_with("❌"));
}

#[tokio::test]
async fn test_fetch_timeout_fails_before_decoding() {
    let classifier = Arc::new(StubClassifier::new(peaked_scores(0)));
    let fetcher = Arc::new(TimeoutFetcher {
        timeout: Duration::from_millis(50),
    });
    let pipeline = pipeline_with(model_with(classifier.clone(), 1), fetcher);
    let sink = RecordingSink::new();

    let outcome = pipeline.run("slow", &sink, &CancellationToken::new()).await;

    assert_eq!(
        outcome.final_state,
        RequestState::Failed {
            stage: Stage::Fetching,
            kind: ErrorKind::Fetch
        }
    );
    assert!(!outcome.visited(Stage::Decoding));
    assert_eq!(classifier.calls(), 0);
    assert_eq!(sink.update_count(), 1);
    assert!(sink.texts()[1].contains("couldn't download"));
}

#[tokio::test]
async fn test_inference_failure_hides_engine_details() {
    let fetcher = Arc::new(StaticFetcher::new().with("img", png_bytes(10, 10)));
    let pipeline = pipeline_with(model_with(Arc::new(FailingClassifier), 1), fetcher);
    let sink = RecordingSink::new();

    let outcome = pipeline.run("img", &sink, &CancellationToken::new()).await;

    assert_eq!(
        outcome.final_state,
        RequestState::Failed {
            stage: Stage::Inferring,
            kind: ErrorKind::Inference
        }
    );
    let terminal = &sink.texts()[1];
    assert!(terminal.starts_with("❌"));
    assert!(!terminal.contains("0x2a"));
}

#[tokio::test]
async fn test_missing_file_is_a_fetch_failure() {
    let pipeline = pipeline_with(
        model_with(Arc::new(StubClassifier::new(peaked_scores(0))), 1),
        Arc::new(StaticFetcher::new()),
    );
    let sink = RecordingSink::new();

    let outcome = pipeline.run("gone", &sink, &CancellationToken::new()).await;
    assert_eq!(outcome.error.map(|e| e.kind()), Some(ErrorKind::Fetch));
}

#[tokio::test]
async fn test_terminal_message_sent_fresh_when_update_fails() {
    let fetcher = Arc::new(StaticFetcher::new().with("img", png_bytes(10, 10)));
    let pipeline = pipeline_with(
        model_with(Arc::new(StubClassifier::new(peaked_scores(1))), 1),
        fetcher,
    );
    let sink = RecordingSink::rejecting_updates();

    let outcome = pipeline.run("img", &sink, &CancellationToken::new()).await;

    assert!(outcome.is_delivered());
    assert_eq!(sink.notify_count(), 2);
    assert!(sink.texts()[1].contains("Best guess:** Goldfish"));
}

#[tokio::test]
async fn test_run_survives_a_sink_that_rejects_everything() {
    let fetcher = Arc::new(StaticFetcher::new().with("img", png_bytes(10, 10)));
    let pipeline = pipeline_with(
        model_with(Arc::new(StubClassifier::new(peaked_scores(1))), 1),
        fetcher,
    );
    let sink = RecordingSink::rejecting_notifications();

    let outcome = pipeline.run("img", &sink, &CancellationToken::new()).await;

    assert!(outcome.is_delivered());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_cancel_during_inference_suppresses_terminal_message() {
    let classifier = Arc::new(StubClassifier::with_delay(
        peaked_scores(2),
        Duration::from_millis(300),
    ));
    let fetcher = Arc::new(StaticFetcher::new().with("img", png_bytes(16, 16)));
    let pipeline = pipeline_with(model_with(classifier.clone(), 1), fetcher);
    let sink = Arc::new(RecordingSink::new());
    let cancel = CancellationToken::new();

    let task = {
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();
        tokio::spawn(async move { pipeline.run("img", sink.as_ref(), &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let outcome = task.await.unwrap();

    assert!(matches!(outcome.final_state, RequestState::Cancelled { .. }));
    assert!(outcome.report.is_none());
    // Only the interim message went out
    assert_eq!(sink.texts(), vec![PROCESSING_MESSAGE.to_string()]);
}

#[tokio::test]
async fn test_cancel_during_fetch() {
    let classifier = Arc::new(StubClassifier::new(peaked_scores(2)));
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with("img", png_bytes(16, 16))
            .with_delay(Duration::from_secs(5)),
    );
    let pipeline = pipeline_with(model_with(classifier.clone(), 1), fetcher);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let outcome = pipeline.run("img", &sink, &cancel).await;
    canceller.await.unwrap();

    assert_eq!(
        outcome.final_state,
        RequestState::Cancelled {
            stage: Stage::Fetching
        }
    );
    assert_eq!(classifier.calls(), 0);
    assert_eq!(sink.update_count(), 0);
}
