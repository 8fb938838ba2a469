//! Health Handler
//!
//! 托管运行时据此判断是否回收 Worker

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::domain::synthesis::ModelVariant;
use crate::infrastructure::http::dto::HealthResponse;
use crate::infrastructure::http::state::AppState;

/// Health endpoint - 记录过致命错误后返回 503
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let fatal = state.health.fatal_error().cloned();
    let status = if fatal.is_some() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = HealthResponse {
        status: if fatal.is_some() { "unhealthy" } else { "ok" },
        fatal,
        models: ModelVariant::ALL
            .iter()
            .map(|variant| (variant.as_str().to_string(), state.models.status(*variant)))
            .collect(),
        executor: state.executor.stats(),
        jobs: state.tracker.counts(),
    };

    (status, Json(body)).into_response()
}
