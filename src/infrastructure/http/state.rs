//! Application State
//!
//! HTTP 层共享的任务调度器与各端口

use std::sync::Arc;

use crate::application::{
    JobTrackerPort, ModelProviderPort, RunJobHandler, SynthesisExecutorPort, WorkerHealth,
};

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub models: Arc<dyn ModelProviderPort>,
    pub executor: Arc<dyn SynthesisExecutorPort>,
    pub tracker: Arc<dyn JobTrackerPort>,
    pub health: Arc<WorkerHealth>,

    // ========== Command Handlers ==========
    pub run_job_handler: Arc<RunJobHandler>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        run_job_handler: Arc<RunJobHandler>,
        models: Arc<dyn ModelProviderPort>,
        executor: Arc<dyn SynthesisExecutorPort>,
        tracker: Arc<dyn JobTrackerPort>,
        health: Arc<WorkerHealth>,
    ) -> Self {
        Self {
            models,
            executor,
            tracker,
            health,
            run_job_handler,
        }
    }
}
