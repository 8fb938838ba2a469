//! RunVoice - 无服务器 TTS 推理 Worker
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Synthesis Context: 推理任务、合成输入、音频结果
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SynthesisModel, ModelProvider, SynthesisExecutor, AudioEncoder, ReferenceAudio, JobTracker）
//! - Commands: 请求校验器与任务调度器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: /runsync、/run、/status、/health
//! - Model: 惰性加载器，sidecar 与 synthetic 后端
//! - Worker: FIFO 准入的 GPU 执行器，本地单次执行
//! - Memory: JobTracker 内存实现
//! - Adapters: 参考音频解析，音频编解码

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
