// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::pipeline::{ErrorKind, FetchError, PipelineError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    /// Bytes arrived but are not a usable image
    UnprocessableImage(String),
    /// The image URL could not be fetched
    UpstreamFetch(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::UnprocessableImage(msg) => ("decode_error", msg.clone(), None),
            ApiError::UpstreamFetch(msg) => ("fetch_error", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::UnprocessableImage(_) => 422,
            ApiError::UpstreamFetch(_) => 502,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        // Stage details stay in the logs; the body carries the user-facing text
        let message = err.user_message().to_string();
        match (&err, err.kind()) {
            (PipelineError::Fetch(FetchError::InvalidReference(reason)), _) => {
                ApiError::ValidationError {
                    field: "url".to_string(),
                    message: reason.clone(),
                }
            }
            (_, ErrorKind::Fetch) => ApiError::UpstreamFetch(message),
            (_, ErrorKind::Decode) => ApiError::UnprocessableImage(message),
            (_, ErrorKind::Preprocess | ErrorKind::Inference | ErrorKind::Rank) => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::UnprocessableImage(msg) => write!(f, "Unprocessable image: {}", msg),
            ApiError::UpstreamFetch(msg) => write!(f, "Image fetch failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Attach the request id so the caller can quote it against the logs
    pub fn with_request_id(self, request_id: impl Into<String>) -> RequestError {
        RequestError {
            error: self,
            request_id: request_id.into(),
        }
    }
}

/// An [`ApiError`] tied to the request that produced it
#[derive(Debug, Clone)]
pub struct RequestError {
    pub error: ApiError,
    pub request_id: String,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.error.to_response(Some(self.request_id)))).into_response()
    }
}
