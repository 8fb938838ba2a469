//! Job Commands - 推理任务命令与响应负载

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::error::JobError;
use crate::domain::synthesis::JobId;

/// 执行推理任务命令
///
/// 负载保持原样，由校验器解析；ID 在构造时确定，拒绝响应也能带上它
#[derive(Debug, Clone)]
pub struct RunJobCommand {
    pub job_id: JobId,
    pub payload: Value,
}

impl RunJobCommand {
    /// 从原始负载构造，`id` 缺失时分配新 ID
    pub fn from_payload(payload: Value) -> Self {
        let external_id = match payload.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        Self {
            job_id: JobId::from_external(external_id.as_deref()),
            payload,
        }
    }
}

/// 成功输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// base64 编码的音频
    pub audio_base64: String,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub format: String,
    pub channels: u16,
    pub mode: String,
    pub model_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language_id: Option<String>,
    pub voice_cloned: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

/// 错误详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobErrorBody {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&JobError> for JobErrorBody {
    fn from(err: &JobError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }
}

/// 响应负载
///
/// 每个任务恰好产生一个，永远不会以未处理异常代替
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponsePayload {
    Completed { id: String, output: JobOutput },
    Failed { id: String, error: JobErrorBody },
}

impl ResponsePayload {
    pub fn completed(id: &JobId, output: JobOutput) -> Self {
        Self::Completed {
            id: id.as_str().to_string(),
            output,
        }
    }

    pub fn failed(id: &JobId, err: &JobError) -> Self {
        Self::Failed {
            id: id.as_str().to_string(),
            error: err.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Completed { id, .. } | Self::Failed { id, .. } => id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn error(&self) -> Option<&JobErrorBody> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Completed { .. } => None,
        }
    }
}
