//! Synthesis Model Port - 合成模型抽象
//!
//! 模型内部结构不可见，只暴露一个前向计算函数；具体实现在 infrastructure/model 层

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::synthesis::{GenerationOptions, ModelVariant, SynthesisInput, SynthesisResult};

/// 设备级错误
///
/// 模型实现必须把底层设备异常翻译成这里的变体，不允许向上抛出原始异常
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device out of memory: {0}")]
    OutOfMemory(String),

    #[error("Device fault: {0}")]
    Fault(String),

    /// 设备侧在给定时长内没有响应，并不代表设备损坏
    #[error("Device did not respond within {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Synthesis cancelled")]
    Cancelled,
}

/// 模型加载错误
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Model weights missing: {0}")]
    WeightsMissing(String),

    #[error("Model weights corrupted: {0}")]
    WeightsCorrupted(String),

    #[error("Insufficient device memory: {0}")]
    InsufficientMemory(String),

    #[error("Model source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Model load failed: {0}")]
    Other(String),
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 任务 ID（用于日志和追踪）
    pub job_id: String,
    pub input: SynthesisInput,
    pub options: GenerationOptions,
}

/// Synthesis Model
///
/// 一个已加载到设备上的模型变体
#[async_trait]
pub trait SynthesisModel: Send + Sync {
    /// 模型变体
    fn variant(&self) -> ModelVariant;

    /// 模型原生采样率
    fn sample_rate(&self) -> u32;

    /// 执行一次前向计算
    ///
    /// `cancel` 被触发时，支持中断的实现应尽快返回 `DeviceError::Cancelled`；
    /// 不支持中断的实现可以忽略它并正常跑完
    async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<SynthesisResult, DeviceError>;
}

/// Model Source Port
///
/// 模型权重来源（模型仓库或本地缓存），负责把权重加载到设备上
#[async_trait]
pub trait ModelSourcePort: Send + Sync {
    async fn load(&self, variant: ModelVariant) -> Result<Arc<dyn SynthesisModel>, LoadError>;

    /// 来源描述（用于日志）
    fn describe(&self) -> String;
}

/// 模型句柄
///
/// 进程级单例，初始化后只读
pub struct ModelHandle {
    variant: ModelVariant,
    model: Arc<dyn SynthesisModel>,
    loaded_at: DateTime<Utc>,
    load_duration: Duration,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn SynthesisModel>, load_duration: Duration) -> Self {
        Self {
            variant: model.variant(),
            model,
            loaded_at: Utc::now(),
            load_duration,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn model(&self) -> &Arc<dyn SynthesisModel> {
        &self.model
    }

    pub fn sample_rate(&self) -> u32 {
        self.model.sample_rate()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn load_duration(&self) -> Duration {
        self.load_duration
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("variant", &self.variant)
            .field("sample_rate", &self.sample_rate())
            .field("loaded_at", &self.loaded_at)
            .field("load_duration", &self.load_duration)
            .finish()
    }
}
