//! Worker Health - 进程健康状态
//!
//! 模型加载失败或 GPU 故障后进程不再接受任务，由托管运行时回收

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::OnceLock;

/// 致命错误记录
#[derive(Debug, Clone, Serialize)]
pub struct FatalError {
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Worker 健康状态
#[derive(Debug, Default)]
pub struct WorkerHealth {
    fatal: OnceLock<FatalError>,
}

impl WorkerHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记为不健康，只保留第一次致命错误
    pub fn mark_fatal(&self, kind: &str, message: impl Into<String>) {
        let message = message.into();
        let recorded = self
            .fatal
            .set(FatalError {
                kind: kind.to_string(),
                message: message.clone(),
                at: Utc::now(),
            })
            .is_ok();
        if recorded {
            tracing::error!(kind = %kind, error = %message, "Worker marked unhealthy");
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.fatal.get().is_none()
    }

    pub fn fatal_error(&self) -> Option<&FatalError> {
        self.fatal.get()
    }
}
