// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request state machine of the classification pipeline

use std::fmt;

use serde::Serialize;

/// Non-terminal pipeline states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Received,
    Fetching,
    Decoding,
    Preprocessing,
    Inferring,
    Ranking,
    Formatting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Fetching => "FETCHING",
            Self::Decoding => "DECODING",
            Self::Preprocessing => "PREPROCESSING",
            Self::Inferring => "INFERRING",
            Self::Ranking => "RANKING",
            Self::Formatting => "FORMATTING",
        }
    }

    /// The stage that follows this one, `None` after formatting
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Received => Some(Self::Fetching),
            Self::Fetching => Some(Self::Decoding),
            Self::Decoding => Some(Self::Preprocessing),
            Self::Preprocessing => Some(Self::Inferring),
            Self::Inferring => Some(Self::Ranking),
            Self::Ranking => Some(Self::Formatting),
            Self::Formatting => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a stage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Decode,
    Preprocess,
    Inference,
    Rank,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch_error",
            Self::Decode => "decode_error",
            Self::Preprocess => "preprocess_error",
            Self::Inference => "inference_error",
            Self::Rank => "rank_error",
        };
        f.write_str(name)
    }
}

/// Where a request currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Active { stage: Stage },
    Delivered,
    Failed { stage: Stage, kind: ErrorKind },
    /// The requester went away; no further notifications are sent
    Cancelled { stage: Stage },
}

impl RequestState {
    pub const RECEIVED: RequestState = RequestState::Active {
        stage: Stage::Received,
    };

    pub fn active(stage: Stage) -> Self {
        Self::Active { stage }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active { .. })
    }

    /// Stage the request is in, or was in when it terminated
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Active { stage } | Self::Failed { stage, .. } | Self::Cancelled { stage } => {
                Some(*stage)
            }
            Self::Delivered => None,
        }
    }

    /// Allowed moves: one stage forward, FORMATTING to DELIVERED, or any
    /// active stage to FAILED/CANCELLED at that same stage.
    pub fn can_transition_to(&self, next: &RequestState) -> bool {
        match (self, next) {
            (Self::Active { stage }, Self::Active { stage: to }) => stage.next() == Some(*to),
            (Self::Active { stage }, Self::Delivered) => *stage == Stage::Formatting,
            (Self::Active { stage }, Self::Failed { stage: at, .. }) => stage == at,
            (Self::Active { stage }, Self::Cancelled { stage: at }) => stage == at,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { stage } => write!(f, "{}", stage),
            Self::Delivered => f.write_str("DELIVERED"),
            Self::Failed { stage, kind } => write!(f, "FAILED({} at {})", kind, stage),
            Self::Cancelled { stage } => write!(f, "CANCELLED(at {})", stage),
        }
    }
}

/// Records every transition a request makes
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: RequestState,
    history: Vec<RequestState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: RequestState::RECEIVED,
            history: vec![RequestState::RECEIVED],
        }
    }

    pub fn current(&self) -> RequestState {
        self.current
    }

    /// Stage of the current state (`Formatting` once delivered)
    pub fn stage(&self) -> Stage {
        self.current.stage().unwrap_or(Stage::Formatting)
    }

    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`; returns false (and leaves the state untouched) for an illegal move
    pub fn transition(&mut self, next: RequestState) -> bool {
        if !self.current.can_transition_to(&next) {
            tracing::error!("Illegal pipeline transition {} -> {}", self.current, next);
            return false;
        }
        tracing::debug!("Pipeline transition {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
        true
    }

    /// Advance to the given stage
    pub fn enter(&mut self, stage: Stage) -> bool {
        self.transition(RequestState::active(stage))
    }

    /// Fail at the current stage
    pub fn fail(&mut self, kind: ErrorKind) -> bool {
        let stage = self.stage();
        self.transition(RequestState::Failed { stage, kind })
    }

    /// Cancel at the current stage
    pub fn cancel(&mut self) -> bool {
        let stage = self.stage();
        self.transition(RequestState::Cancelled { stage })
    }

    pub fn into_history(self) -> Vec<RequestState> {
        self.history
    }
}
