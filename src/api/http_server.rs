// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Instant};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::classify::classify_handler;
use crate::pipeline::ClassificationPipeline;
use crate::version;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: ClassificationPipeline,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: ClassificationPipeline) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub features: Vec<String>,
    pub formats: Vec<String>,
    pub model: String,
    pub model_version: String,
    pub classes: usize,
    pub max_concurrent_inferences: usize,
    pub uptime_seconds: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Classification endpoint
        .route("/v1/classify", post(classify_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled
pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🌐 API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.pipeline.model();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::VERSION_NUMBER.to_string(),
        build: version::VERSION.to_string(),
        features: version::FEATURES.iter().map(|f| f.to_string()).collect(),
        formats: version::SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
        model: model.spec().name.clone(),
        model_version: model.spec().version.clone(),
        classes: model.num_classes(),
        max_concurrent_inferences: model.max_concurrent_inferences(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
