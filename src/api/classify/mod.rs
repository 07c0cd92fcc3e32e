// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Classify image API endpoint module
//!
//! Provides POST /v1/classify for top-K ImageNet classification.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::classify_handler;
pub use request::ClassifyRequest;
pub use response::{ClassifyResponse, RankedLabel};
