//! Job Tracker Port - 任务状态追踪
//!
//! 定义任务追踪的抽象接口，具体实现在 infrastructure/memory 层

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::commands::ResponsePayload;
use crate::domain::synthesis::JobId;

/// Job Tracker 错误
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Job already in progress: {0}")]
    AlreadyActive(String),
}

/// 任务状态
///
/// Received → Validating → (Rejected | ModelLoading → Queued → Synthesizing → Encoding → Completed)，
/// 任意非终态都可能转为 Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Validating,
    Rejected,
    ModelLoading,
    Queued,
    Synthesizing,
    Encoding,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Received => "received",
            JobState::Validating => "validating",
            JobState::Rejected => "rejected",
            JobState::ModelLoading => "model_loading",
            JobState::Queued => "queued",
            JobState::Synthesizing => "synthesizing",
            JobState::Encoding => "encoding",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Rejected | JobState::Completed | JobState::Failed
        )
    }
}

/// 任务记录
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// 终态响应（仅终态时存在）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponsePayload>,
}

impl JobRecord {
    pub fn new(job_id: &JobId) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.as_str().to_string(),
            state: JobState::Received,
            received_at: now,
            updated_at: now,
            finished_at: None,
            response: None,
        }
    }
}

/// 各状态任务数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    /// 处于非终态的任务
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Job Tracker Port
///
/// 所有状态存储在内存中，进程重启即丢失
pub trait JobTrackerPort: Send + Sync {
    /// 登记新任务；同 ID 任务仍在进行中时拒绝
    fn register(&self, job_id: &JobId) -> Result<(), TrackerError>;

    /// 推进任务状态（终态请使用 finish）
    fn transition(&self, job_id: &JobId, state: JobState);

    /// 写入终态及最终响应
    fn finish(&self, job_id: &JobId, state: JobState, response: ResponsePayload);

    /// 查询任务
    fn get(&self, job_id: &str) -> Option<JobRecord>;

    /// 统计
    fn counts(&self) -> JobCounts;
}
