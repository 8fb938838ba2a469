//! Lazy Model Loader - 按变体惰性加载模型
//!
//! 每个变体一个 OnceCell；并发首调用等待同一次加载，加载失败后该变体被标记为不可用

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

use crate::application::ports::{
    LoadError, ModelHandle, ModelProviderPort, ModelSourcePort, ModelStatus,
};
use crate::domain::synthesis::ModelVariant;

/// 加载进行中的标记，加载 future 被丢弃时同样移除
struct LoadingMark<'a> {
    loading: &'a DashMap<ModelVariant, ()>,
    variant: ModelVariant,
}

impl<'a> LoadingMark<'a> {
    fn set(loading: &'a DashMap<ModelVariant, ()>, variant: ModelVariant) -> Self {
        loading.insert(variant, ());
        Self { loading, variant }
    }
}

impl Drop for LoadingMark<'_> {
    fn drop(&mut self) {
        self.loading.remove(&self.variant);
    }
}

/// 惰性模型加载器
pub struct LazyModelLoader {
    source: Arc<dyn ModelSourcePort>,
    slots: HashMap<ModelVariant, OnceCell<Arc<ModelHandle>>>,
    /// 加载失败的变体，进程内不再重试
    failures: DashMap<ModelVariant, LoadError>,
    loading: DashMap<ModelVariant, ()>,
    load_count: AtomicUsize,
}

impl LazyModelLoader {
    pub fn new(source: Arc<dyn ModelSourcePort>) -> Self {
        Self {
            source,
            slots: ModelVariant::ALL
                .iter()
                .map(|variant| (*variant, OnceCell::new()))
                .collect(),
            failures: DashMap::new(),
            loading: DashMap::new(),
            load_count: AtomicUsize::new(0),
        }
    }

    /// 实际执行过的加载次数
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    fn slot(&self, variant: ModelVariant) -> Result<&OnceCell<Arc<ModelHandle>>, LoadError> {
        self.slots
            .get(&variant)
            .ok_or_else(|| LoadError::Other(format!("no slot for variant {}", variant)))
    }

    async fn load(&self, variant: ModelVariant) -> Result<Arc<ModelHandle>, LoadError> {
        // 等待中的调用者在首个加载失败后会进入这里，直接返回记录的错误
        if let Some(err) = self.failures.get(&variant) {
            return Err(err.clone());
        }

        self.load_count.fetch_add(1, Ordering::SeqCst);
        let mark = LoadingMark::set(&self.loading, variant);
        tracing::info!(
            variant = %variant,
            source = %self.source.describe(),
            "Loading model"
        );

        let started = Instant::now();
        let result = self.source.load(variant).await;
        drop(mark);

        match result {
            Ok(model) => {
                let handle = Arc::new(ModelHandle::new(model, started.elapsed()));
                tracing::info!(
                    variant = %variant,
                    sample_rate = handle.sample_rate(),
                    load_ms = handle.load_duration().as_millis() as u64,
                    "Model ready"
                );
                Ok(handle)
            }
            Err(err) => {
                tracing::error!(variant = %variant, error = %err, "Model load failed");
                self.failures.insert(variant, err.clone());
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ModelProviderPort for LazyModelLoader {
    async fn ensure_ready(&self, variant: ModelVariant) -> Result<Arc<ModelHandle>, LoadError> {
        let slot = self.slot(variant)?;
        if let Some(handle) = slot.get() {
            return Ok(handle.clone());
        }
        if let Some(err) = self.failures.get(&variant) {
            return Err(err.clone());
        }

        slot.get_or_try_init(|| self.load(variant))
            .await
            .map(Arc::clone)
    }

    fn is_ready(&self, variant: ModelVariant) -> bool {
        self.slots
            .get(&variant)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    fn status(&self, variant: ModelVariant) -> ModelStatus {
        if let Some(handle) = self.slots.get(&variant).and_then(|slot| slot.get()) {
            return ModelStatus::Ready {
                sample_rate: handle.sample_rate(),
                loaded_at: handle.loaded_at(),
            };
        }
        if let Some(err) = self.failures.get(&variant) {
            return ModelStatus::Failed {
                error: err.to_string(),
            };
        }
        if self.loading.contains_key(&variant) {
            return ModelStatus::Loading;
        }
        ModelStatus::NotLoaded
    }
}
