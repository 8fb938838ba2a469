//! Model Provider Port - 模型生命周期管理

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{LoadError, ModelHandle};
use crate::domain::synthesis::ModelVariant;

/// 模型状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    /// 尚未加载
    NotLoaded,
    /// 正在加载
    Loading,
    /// 已就绪
    Ready {
        sample_rate: u32,
        loaded_at: DateTime<Utc>,
    },
    /// 加载失败（进程内不再重试）
    Failed { error: String },
}

/// Model Provider Port
///
/// 按变体惰性加载模型；同一变体最多一次加载成功，并发首调用共享同一次加载
#[async_trait]
pub trait ModelProviderPort: Send + Sync {
    /// 确保模型就绪并返回句柄
    async fn ensure_ready(&self, variant: ModelVariant) -> Result<Arc<ModelHandle>, LoadError>;

    /// 模型是否已就绪（不触发加载）
    fn is_ready(&self, variant: ModelVariant) -> bool;

    /// 查询模型状态
    fn status(&self, variant: ModelVariant) -> ModelStatus;
}
