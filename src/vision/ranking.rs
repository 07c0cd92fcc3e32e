// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Top-K decoding of classifier scores

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use super::labels::Taxonomy;

/// Number of predictions reported per image
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    #[error("Score vector has {actual} entries, taxonomy has {expected} classes")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Score at index {0} is not a finite number")]
    NonFiniteScore(usize),
}

/// A single labeled prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Index of the class in the taxonomy
    pub class_index: usize,
    /// Raw taxonomy label
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// Predictions ordered by non-increasing confidence, ties by ascending class index
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RankedPredictions(Vec<Prediction>);

impl RankedPredictions {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Best prediction, if any
    pub fn top(&self) -> Option<&Prediction> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Prediction] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a RankedPredictions {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Select the `k` highest-scoring classes
///
/// Scores are expected to be probabilities already (softmax applied by the
/// model or the classifier); they are clamped into [0, 1].
pub fn rank_predictions(
    scores: &[f32],
    taxonomy: &Taxonomy,
    k: usize,
) -> Result<RankedPredictions, RankError> {
    if scores.len() != taxonomy.len() {
        return Err(RankError::LengthMismatch {
            expected: taxonomy.len(),
            actual: scores.len(),
        });
    }

    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(RankError::NonFiniteScore(index));
    }

    // Clamp first so equal reported confidences fall back to index order
    let confidences: Vec<f32> = scores.iter().map(|s| s.clamp(0.0, 1.0)).collect();

    let mut order: Vec<usize> = (0..confidences.len()).collect();
    order.sort_unstable_by(|&a, &b| match confidences[b].total_cmp(&confidences[a]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });

    let predictions = order
        .into_iter()
        .take(k)
        .filter_map(|index| {
            taxonomy.label(index).map(|label| Prediction {
                class_index: index,
                label: label.to_string(),
                confidence: confidences[index],
            })
        })
        .collect();

    Ok(RankedPredictions(predictions))
}
