// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Top-K ranking against the full 10-label test taxonomy

use super::common::*;
use fabstir_image_classifier::vision::{rank_predictions, RankError, DEFAULT_TOP_K};

#[test]
fn test_default_top_five() {
    let scores = vec![0.01, 0.02, 0.05, 0.40, 0.30, 0.10, 0.04, 0.03, 0.02, 0.03];
    let ranked = rank_predictions(&scores, &taxonomy(), DEFAULT_TOP_K).unwrap();

    assert_eq!(ranked.len(), 5);
    let labels: Vec<&str> = ranked.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["tabby", "tiger_cat", "Persian_cat", "great_white_shark", "golden_retriever"]
    );
    assert!(ranked
        .as_slice()
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn test_ties_resolve_by_class_index() {
    let scores = vec![0.1; NUM_CLASSES];
    let ranked = rank_predictions(&scores, &taxonomy(), 3).unwrap();
    let indices: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_one_hot_ranks_first_then_index_order() {
    let mut scores = vec![0.0; NUM_CLASSES];
    scores[7] = 1.0;
    let ranked = rank_predictions(&scores, &taxonomy(), NUM_CLASSES).unwrap();

    let top = ranked.top().unwrap();
    assert_eq!(top.label, "German_shepherd");
    assert_eq!(top.confidence, 1.0);

    let rest: Vec<usize> = ranked.iter().skip(1).map(|p| p.class_index).collect();
    assert_eq!(rest, vec![0, 1, 2, 3, 4, 5, 6, 8, 9]);

    let mut labels: Vec<&str> = ranked.iter().map(|p| p.label.as_str()).collect();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), NUM_CLASSES);
}

#[test]
fn test_k_larger_than_taxonomy_returns_everything() {
    let ranked = rank_predictions(&peaked_scores(9), &taxonomy(), 50).unwrap();
    assert_eq!(ranked.len(), NUM_CLASSES);
    assert_eq!(ranked.top().unwrap().label, "espresso");
}

#[test]
fn test_wrong_length_is_rejected() {
    let err = rank_predictions(&[0.5, 0.5], &taxonomy(), 5).unwrap_err();
    assert_eq!(
        err,
        RankError::LengthMismatch {
            expected: NUM_CLASSES,
            actual: 2
        }
    );
}

#[test]
fn test_nan_score_is_rejected() {
    let mut scores = peaked_scores(1);
    scores[4] = f32::NAN;
    assert_eq!(
        rank_predictions(&scores, &taxonomy(), 5).unwrap_err(),
        RankError::NonFiniteScore(4)
    );
}

#[test]
fn test_confidences_are_clamped() {
    let mut scores = vec![0.0; NUM_CLASSES];
    scores[2] = 1.0000002;
    scores[3] = -0.0001;
    let ranked = rank_predictions(&scores, &taxonomy(), NUM_CLASSES).unwrap();
    assert!(ranked.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
    assert_eq!(ranked.top().unwrap().confidence, 1.0);
}

#[test]
fn test_saturated_scores_tie_by_class_index() {
    let mut scores = vec![0.0; NUM_CLASSES];
    scores[8] = 1.2;
    scores[4] = 1.1;
    let ranked = rank_predictions(&scores, &taxonomy(), 2).unwrap();

    let top: Vec<(usize, f32)> = ranked.iter().map(|p| (p.class_index, p.confidence)).collect();
    assert_eq!(top, vec![(4, 1.0), (8, 1.0)]);
}
