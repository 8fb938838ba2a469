//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SynthesisModel、ModelProvider、SynthesisExecutor、AudioEncoder 等）
//! - commands: 推理任务命令及处理器（校验器、调度器）
//! - health: 进程健康状态
//! - error: 任务错误定义

pub mod commands;
pub mod error;
pub mod health;
pub mod ports;

// Re-exports
pub use commands::{
    handlers::{RequestValidator, RunJobHandler, ValidatorConfig},
    JobErrorBody, JobOutput, ResponsePayload, RunJobCommand,
};

pub use error::JobError;
pub use health::{FatalError, WorkerHealth};

pub use ports::{
    // Audio encoder
    AudioEncoderPort,
    EncodedAudio,
    EncodingError,
    // Job tracker
    JobCounts,
    JobRecord,
    JobState,
    JobTrackerPort,
    TrackerError,
    // Model
    DeviceError,
    LoadError,
    ModelHandle,
    ModelProviderPort,
    ModelSourcePort,
    ModelStatus,
    SynthesisModel,
    SynthesisRequest,
    // Executor
    ExecutionError,
    ExecutorStats,
    SynthesisExecutorPort,
    // Reference audio
    ReferenceAudioError,
    ReferenceAudioPort,
};
