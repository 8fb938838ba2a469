//! 应用层错误定义
//!
//! 任务处理过程中所有可能的失败，统一映射为响应中的 kind / retryable

use thiserror::Error;

use crate::application::ports::{EncodingError, ExecutionError, LoadError};
use crate::domain::synthesis::ValidationError;

/// 任务错误
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// 内部错误（例如编码任务 panic）
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 响应中的错误类型
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(e) => e.kind(),
            JobError::Load(_) => "LoadError",
            JobError::Execution(e) => match e {
                ExecutionError::GpuOutOfMemory(_) => "GpuOutOfMemory",
                ExecutionError::GpuFault(_) => "GpuFault",
                ExecutionError::SynthesisTimeout(_) => "SynthesisTimeout",
                ExecutionError::QueueTimeout { .. } => "QueueTimeout",
                ExecutionError::QueueFull { .. } => "QueueFull",
            },
            JobError::Encoding(_) => "EncodingError",
            JobError::Internal(_) => "InternalError",
        }
    }

    /// 调用方原样重试是否可能成功
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            JobError::Execution(
                ExecutionError::GpuOutOfMemory(_)
                    | ExecutionError::SynthesisTimeout(_)
                    | ExecutionError::QueueTimeout { .. }
                    | ExecutionError::QueueFull { .. }
            )
        )
    }

    /// 是否导致本进程不再健康（托管运行时应回收该 worker）
    pub fn is_worker_fatal(&self) -> bool {
        matches!(
            self,
            JobError::Load(_) | JobError::Execution(ExecutionError::GpuFault(_))
        )
    }

    /// 是否为请求校验失败
    pub fn is_rejection(&self) -> bool {
        matches!(self, JobError::Validation(_))
    }
}
