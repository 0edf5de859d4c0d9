//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{health, qna};
use crate::state::AppState;
use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Question answering routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/qna/", post(qna::qna_handler))
        .route("/qna", post(qna::qna_handler))
}

/// Health checks, counters and the docs redirect
pub fn service_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/docs/") }))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
}
