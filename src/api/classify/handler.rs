// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classify endpoint handler

use std::time::Instant;

use axum::{extract::State, Json};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::request::ClassifyRequest;
use super::response::ClassifyResponse;
use crate::api::errors::{ApiError, RequestError};
use crate::api::http_server::AppState;

/// POST /v1/classify - Classify an inline or remote image
///
/// Runs the same stages as the chat pipeline, minus the notifications.
pub async fn classify_handler(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, RequestError> {
    let request_id = Uuid::new_v4().to_string();
    classify(&state, &request, &request_id)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(request_id))
}

async fn classify(
    state: &AppState,
    request: &ClassifyRequest,
    request_id: &str,
) -> Result<ClassifyResponse, ApiError> {
    request.validate()?;

    let started = Instant::now();
    let pipeline = &state.pipeline;

    let result = match (request.image_bytes()?, request.url.as_deref()) {
        (Some(bytes), _) => {
            pipeline
                .classify_bytes(Bytes::from(bytes), request.top_k)
                .await
        }
        (None, Some(url)) => pipeline.classify_reference(url, request.top_k).await,
        (None, None) => {
            return Err(ApiError::InvalidRequest(
                "one of image or url is required".to_string(),
            ))
        }
    };

    let report = result.map_err(|e| {
        warn!("[{}] Classification failed at {}: {}", request_id, e.stage(), e);
        ApiError::from(e)
    })?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        "[{}] 🖼️ Classified {}x{} {} image in {}ms",
        request_id,
        report.image().width,
        report.image().height,
        report.image().format,
        elapsed_ms
    );

    Ok(ClassifyResponse::from_report(
        &report,
        pipeline.model().spec(),
        elapsed_ms,
    ))
}
