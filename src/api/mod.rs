// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod classify;
pub mod errors;
pub mod http_server;

pub use classify::{classify_handler, ClassifyRequest, ClassifyResponse, RankedLabel};
pub use errors::{ApiError, ErrorResponse, RequestError};
pub use http_server::{create_router, start_server, AppState, HealthResponse};
