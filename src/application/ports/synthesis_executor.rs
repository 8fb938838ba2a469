//! Synthesis Executor Port - GPU 执行抽象

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::ModelHandle;
use crate::domain::synthesis::{InferenceJob, SynthesisResult};

/// 执行错误
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("GPU out of memory: {0}")]
    GpuOutOfMemory(String),

    #[error("GPU fault: {0}")]
    GpuFault(String),

    #[error("Synthesis did not finish within {}s", .0.as_secs_f64())]
    SynthesisTimeout(Duration),

    #[error("Deadline elapsed after waiting {waited_ms} ms for GPU access")]
    QueueTimeout { waited_ms: u64 },

    #[error("Admission queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },
}

/// 执行器统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// 正在等待 GPU 的任务数
    pub waiting: usize,
    /// 正在占用 GPU 的任务数（包括已超时但计算尚未结束的）
    pub running: usize,
    /// 同时允许进入 GPU 的任务数
    pub permits: usize,
    /// 等待队列容量
    pub queue_capacity: usize,
}

/// Synthesis Executor Port
///
/// 串行化对 GPU 常驻模型的访问：FIFO 准入、排队截止时间、单次合成超时
#[async_trait]
pub trait SynthesisExecutorPort: Send + Sync {
    async fn execute(
        &self,
        job: &InferenceJob,
        model: Arc<ModelHandle>,
    ) -> Result<SynthesisResult, ExecutionError>;

    fn stats(&self) -> ExecutorStats;
}
