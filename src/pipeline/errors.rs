// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use super::fetcher::FetchError;
use super::report::failure_message;
use super::state::{ErrorKind, Stage};
use crate::vision::{DecodeError, InferenceError, PreprocessError, RankError};

/// A stage failure, tagged with the stage it came from
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Ranking failed: {0}")]
    Rank(#[from] RankError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Preprocess(_) => ErrorKind::Preprocess,
            Self::Inference(_) => ErrorKind::Inference,
            Self::Rank(_) => ErrorKind::Rank,
        }
    }

    /// Stage that produced the error
    pub fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetching,
            Self::Decode(_) => Stage::Decoding,
            Self::Preprocess(_) => Stage::Preprocessing,
            Self::Inference(_) => Stage::Inferring,
            Self::Rank(_) => Stage::Ranking,
        }
    }

    /// Text safe to show the requester
    pub fn user_message(&self) -> &'static str {
        failure_message(self.kind())
    }
}
