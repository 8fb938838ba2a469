//! Synthesis Executor - GPU 准入与执行
//!
//! FIFO 信号量控制对常驻模型的访问；合成在独立任务中运行并持有 permit，
//! 超时后调用方不再等待，但 permit 直到计算真正结束才释放

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    DeviceError, ExecutionError, ExecutorStats, JobState, JobTrackerPort, ModelHandle,
    SynthesisExecutorPort, SynthesisRequest,
};
use crate::domain::synthesis::{InferenceJob, SynthesisResult};

/// 执行器配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 同时进入 GPU 的任务数（未开启并发推理时为 1）
    pub max_concurrent: usize,
    /// 等待队列容量
    pub queue_capacity: usize,
    /// 单次合成的墙钟超时
    pub synthesis_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            queue_capacity: 64,
            synthesis_timeout: Duration::from_secs(300),
        }
    }
}

/// 计数守卫，drop 时减一（覆盖 future 被取消和任务 panic）
struct CountGuard(Arc<AtomicUsize>);

impl CountGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for CountGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// FIFO 合成执行器
pub struct FifoSynthesisExecutor {
    config: ExecutorConfig,
    /// tokio 的 Semaphore 按请求顺序分配 permit
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    tracker: Arc<dyn JobTrackerPort>,
}

impl FifoSynthesisExecutor {
    pub fn new(config: ExecutorConfig, tracker: Arc<dyn JobTrackerPort>) -> Self {
        let permits = config.max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config: ExecutorConfig {
                max_concurrent: permits,
                ..config
            },
            waiting: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            tracker,
        }
    }

    fn translate(&self, err: DeviceError) -> ExecutionError {
        match err {
            DeviceError::OutOfMemory(msg) => ExecutionError::GpuOutOfMemory(msg),
            DeviceError::Fault(msg) => ExecutionError::GpuFault(msg),
            DeviceError::Timeout(elapsed) => ExecutionError::SynthesisTimeout(elapsed),
            DeviceError::Cancelled => ExecutionError::SynthesisTimeout(self.config.synthesis_timeout),
        }
    }
}

#[async_trait]
impl SynthesisExecutorPort for FifoSynthesisExecutor {
    async fn execute(
        &self,
        job: &InferenceJob,
        model: Arc<ModelHandle>,
    ) -> Result<SynthesisResult, ExecutionError> {
        let job_id = job.id();

        // 准入：队列满时立即失败
        let waiting = CountGuard::enter(&self.waiting);
        if self.waiting.load(Ordering::SeqCst) > self.config.queue_capacity {
            tracing::warn!(
                job_id = %job_id,
                capacity = self.config.queue_capacity,
                "Admission queue full"
            );
            return Err(ExecutionError::QueueFull {
                capacity: self.config.queue_capacity,
            });
        }

        // 排队窗口从进入准入队列时开始计时
        let queued_at = Instant::now();
        let deadline = queued_at + job.queue_window();
        let acquire = self.semaphore.clone().acquire_owned();
        let permit = match tokio::time::timeout_at(deadline, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ExecutionError::GpuFault(
                    "executor has been shut down".to_string(),
                ))
            }
            Err(_) => {
                let waited_ms = queued_at.elapsed().as_millis() as u64;
                tracing::warn!(job_id = %job_id, waited_ms, "Deadline elapsed while queued");
                return Err(ExecutionError::QueueTimeout { waited_ms });
            }
        };
        drop(waiting);

        let waited_ms = queued_at.elapsed().as_millis() as u64;
        self.tracker.transition(job_id, JobState::Synthesizing);
        tracing::info!(
            job_id = %job_id,
            variant = %model.variant(),
            waited_ms,
            "Synthesis started"
        );

        let request = SynthesisRequest {
            job_id: job_id.to_string(),
            input: job.input().clone(),
            options: job.options().clone(),
        };
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let running = CountGuard::enter(&self.running);
        let started = Instant::now();

        let compute = tokio::spawn(async move {
            // 持有 permit 直到计算结束
            let _permit = permit;
            let _running = running;
            model.model().synthesize(request, task_cancel).await
        });

        let timeout = self.config.synthesis_timeout;
        match tokio::time::timeout(timeout, compute).await {
            Ok(Ok(Ok(result))) => {
                tracing::info!(
                    job_id = %job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    audio_secs = result.duration_secs(),
                    "Synthesis finished"
                );
                Ok(result)
            }
            Ok(Ok(Err(err))) => {
                tracing::error!(job_id = %job_id, error = %err, "Synthesis failed");
                Err(self.translate(err))
            }
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    "model task panicked"
                } else {
                    "model task aborted"
                };
                tracing::error!(job_id = %job_id, error = %join_err, "{}", reason);
                Err(ExecutionError::GpuFault(reason.to_string()))
            }
            Err(_) => {
                cancel.cancel();
                tracing::warn!(
                    job_id = %job_id,
                    timeout_secs = timeout.as_secs_f64(),
                    "Synthesis timed out, result will be discarded"
                );
                Err(ExecutionError::SynthesisTimeout(timeout))
            }
        }
    }

    fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            waiting: self.waiting.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            permits: self.config.max_concurrent,
            queue_capacity: self.config.queue_capacity,
        }
    }
}
