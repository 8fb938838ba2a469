//! Data Transfer Objects

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::application::{
    ExecutorStats, FatalError, JobCounts, JobRecord, JobState, ModelStatus, ResponsePayload,
};

// ============================================================================
// Job DTOs
// ============================================================================

/// 对外暴露的任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicJobStatus {
    InQueue,
    InProgress,
}

impl From<JobState> for PublicJobStatus {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Received
            | JobState::Validating
            | JobState::ModelLoading
            | JobState::Queued => PublicJobStatus::InQueue,
            _ => PublicJobStatus::InProgress,
        }
    }
}

/// 异步提交的应答
#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    pub id: String,
    pub status: PublicJobStatus,
}

/// 未结束任务的状态
#[derive(Debug, Serialize)]
pub struct PendingJobResponse {
    pub id: String,
    pub status: PublicJobStatus,
    /// 细粒度状态（validating、synthesizing 等）
    pub state: JobState,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 状态查询应答：结束的任务直接返回最终负载
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobStatusResponse {
    Finished(ResponsePayload),
    Pending(PendingJobResponse),
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        match record.response {
            Some(response) => JobStatusResponse::Finished(response),
            None => JobStatusResponse::Pending(PendingJobResponse {
                id: record.job_id,
                status: record.state.into(),
                state: record.state,
                received_at: record.received_at,
                updated_at: record.updated_at,
            }),
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok / unhealthy
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
    pub models: BTreeMap<String, ModelStatus>,
    pub executor: ExecutorStats,
    pub jobs: JobCounts,
}
