// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrent requests share one model but never each other's results

use super::common::*;
use fabstir_image_classifier::pipeline::{RecordingSink, SinkEvent, Stage};
use fabstir_image_classifier::RequestState;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REQUESTS: u32 = 8;

/// Every request gets a distinctly sized image so its report can be traced back
fn fetcher_with_distinct_images() -> StaticFetcher {
    (0..REQUESTS).fold(StaticFetcher::new(), |fetcher, i| {
        fetcher.with(&format!("photo-{}", i), png_bytes(20 + i, 10 + i))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_request_gets_its_own_pair_of_messages() {
    let classifier = Arc::new(StubClassifier::with_delay(
        peaked_scores(7),
        Duration::from_millis(20),
    ));
    let pipeline = pipeline_with(
        model_with(classifier.clone(), 1),
        Arc::new(fetcher_with_distinct_images()),
    );

    let sinks: Vec<Arc<RecordingSink>> = (0..REQUESTS)
        .map(|_| Arc::new(RecordingSink::new()))
        .collect();

    let runs = (0..REQUESTS).map(|i| {
        let pipeline = pipeline.clone();
        let sink = Arc::clone(&sinks[i as usize]);
        tokio::spawn(async move {
            pipeline
                .run(&format!("photo-{}", i), sink.as_ref(), &CancellationToken::new())
                .await
        })
    });
    let outcomes = join_all(runs).await;

    for (i, outcome) in outcomes.into_iter().enumerate() {
        let outcome = outcome.unwrap();
        assert!(outcome.is_delivered(), "request {} ended {}", i, outcome.final_state);

        let report = outcome.report.unwrap();
        assert_eq!(report.image().width, 20 + i as u32);
        assert_eq!(report.image().height, 10 + i as u32);

        let events = sinks[i].events();
        assert_eq!(events.len(), 2, "request {} got {:?}", i, events);
        assert!(matches!(events[0], SinkEvent::Notified { .. }));
        match &events[1] {
            SinkEvent::Updated { text, .. } => {
                let size_line = format!("• Size: {}×{} pixels", 20 + i, 10 + i);
                assert!(text.contains(&size_line), "request {} got someone else's report", i);
            }
            other => panic!("request {} expected update, got {:?}", i, other),
        }
    }

    assert_eq!(classifier.calls(), REQUESTS as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_inference_is_serialized_by_default() {
    let classifier = Arc::new(StubClassifier::with_delay(
        peaked_scores(0),
        Duration::from_millis(25),
    ));
    let pipeline = pipeline_with(
        model_with(classifier.clone(), 1),
        Arc::new(fetcher_with_distinct_images()),
    );

    let runs = (0..REQUESTS).map(|i| {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let sink = RecordingSink::new();
            pipeline
                .run(&format!("photo-{}", i), &sink, &CancellationToken::new())
                .await
        })
    });
    for outcome in join_all(runs).await {
        assert!(outcome.unwrap().is_delivered());
    }

    assert_eq!(classifier.calls(), REQUESTS as usize);
    assert_eq!(classifier.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wider_gate_bounds_overlap() {
    let classifier = Arc::new(StubClassifier::with_delay(
        peaked_scores(0),
        Duration::from_millis(50),
    ));
    let pipeline = pipeline_with(
        model_with(classifier.clone(), 2),
        Arc::new(fetcher_with_distinct_images()),
    );

    let runs = (0..REQUESTS).map(|i| {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let sink = RecordingSink::new();
            pipeline
                .run(&format!("photo-{}", i), &sink, &CancellationToken::new())
                .await
        })
    });
    join_all(runs).await;

    assert!(classifier.max_in_flight() <= 2);
    assert_eq!(classifier.calls(), REQUESTS as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_request_keeps_gate_until_forward_pass_ends() {
    let classifier = Arc::new(StubClassifier::with_delay(
        peaked_scores(1),
        Duration::from_millis(400),
    ));
    let pipeline = pipeline_with(
        model_with(classifier.clone(), 1),
        Arc::new(fetcher_with_distinct_images()),
    );

    let cancel = CancellationToken::new();
    let first = {
        let pipeline = pipeline.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let sink = RecordingSink::new();
            pipeline.run("photo-0", &sink, &cancel).await
        })
    };

    // Cancel while the first forward pass is still sleeping
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    let first = first.await.unwrap();
    assert_eq!(
        first.final_state,
        RequestState::Cancelled {
            stage: Stage::Inferring
        }
    );

    let sink = RecordingSink::new();
    let second = pipeline
        .run("photo-1", &sink, &CancellationToken::new())
        .await;
    assert!(second.is_delivered());

    assert_eq!(classifier.calls(), 2);
    assert_eq!(classifier.max_in_flight(), 1);
}
