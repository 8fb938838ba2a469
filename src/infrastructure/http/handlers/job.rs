//! Job Handlers - 任务提交与状态查询

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::application::{JobError, ResponsePayload, RunJobCommand};
use crate::domain::synthesis::{JobId, ValidationError};
use crate::infrastructure::http::dto::{JobAcceptedResponse, JobStatusResponse, PublicJobStatus};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 解析请求体；非法 JSON 也要得到一个 FAILED 负载
fn parse_command(body: &[u8]) -> Result<RunJobCommand, ResponsePayload> {
    serde_json::from_slice(body)
        .map(RunJobCommand::from_payload)
        .map_err(|e| {
            let err = JobError::from(ValidationError::malformed(format!("invalid JSON body: {}", e)));
            ResponsePayload::failed(&JobId::new(), &err)
        })
}

fn ensure_healthy(state: &AppState) -> Result<(), ApiError> {
    match state.health.fatal_error() {
        Some(fatal) => Err(ApiError::ServiceUnavailable(format!(
            "worker is unhealthy ({}): {}",
            fatal.kind, fatal.message
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// Run Sync
// ============================================================================

pub async fn run_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResponsePayload>, ApiError> {
    ensure_healthy(&state)?;

    let cmd = match parse_command(&body) {
        Ok(cmd) => cmd,
        Err(response) => return Ok(Json(response)),
    };
    let job_id = cmd.job_id.clone();

    // 放到独立任务中执行，客户端断开时任务仍会走完并写入终态
    let handler = state.run_job_handler.clone();
    let response = tokio::spawn(async move { handler.handle(cmd).await })
        .await
        .unwrap_or_else(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Job task aborted");
            ResponsePayload::failed(&job_id, &JobError::internal(format!("job task aborted: {}", e)))
        });

    Ok(Json(response))
}

// ============================================================================
// Run Async
// ============================================================================

pub async fn run_async(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    ensure_healthy(&state)?;

    let cmd = match parse_command(&body) {
        Ok(cmd) => cmd,
        Err(response) => return Ok(Json(response).into_response()),
    };

    let handler = state.run_job_handler.clone();
    if let Err(response) = handler.accept(&cmd) {
        return Ok(Json(response).into_response());
    }

    let accepted = JobAcceptedResponse {
        id: cmd.job_id.to_string(),
        status: PublicJobStatus::InQueue,
    };
    tracing::info!(job_id = %cmd.job_id, "Job accepted");

    tokio::spawn(async move {
        handler.process(cmd).await;
    });

    Ok(Json(accepted).into_response())
}

// ============================================================================
// Job Status
// ============================================================================

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    state
        .tracker
        .get(&job_id)
        .map(|record| Json(JobStatusResponse::from(record)))
        .ok_or_else(|| ApiError::NotFound(format!("job not found: {}", job_id)))
}
