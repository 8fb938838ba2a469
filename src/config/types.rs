//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 推理 sidecar 配置
    #[serde(default)]
    pub sidecar: SidecarSection,

    /// Synthetic 后端配置
    #[serde(default)]
    pub synthetic: SyntheticSection,

    /// 请求限制
    #[serde(default)]
    pub limits: LimitsConfig,

    /// 执行器配置
    #[serde(default)]
    pub executor: ExecutorSection,

    /// 音频输出配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 任务追踪配置
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Worker 运行方式
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 模型后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// GPU 推理进程
    #[default]
    Sidecar,
    /// CPU 信号发生器
    Synthetic,
}

impl ModelBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sidecar => "sidecar",
            Self::Synthetic => "synthetic",
        }
    }
}

/// 模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,

    /// 启动时预加载的变体（english / multilingual / voice_clone）
    #[serde(default)]
    pub preload: Vec<String>,

    /// 设备：auto / cuda / mps / cpu
    #[serde(default = "default_device")]
    pub device: String,

    /// 模型缓存目录，默认取 HF_HOME
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// 是否启用下载加速，默认取 HF_HUB_ENABLE_HF_TRANSFER
    #[serde(default)]
    pub hf_transfer: bool,
}

fn default_device() -> String {
    "auto".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            preload: Vec::new(),
            device: default_device(),
            cache_dir: None,
            hf_transfer: false,
        }
    }
}

/// 推理 sidecar 配置
#[derive(Debug, Clone, Deserialize)]
pub struct SidecarSection {
    #[serde(default = "default_sidecar_url")]
    pub url: String,

    /// 加载超时（秒）
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,

    /// 推理请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_sidecar_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_load_timeout() -> u64 {
    900
}

fn default_request_timeout() -> u64 {
    600
}

impl Default for SidecarSection {
    fn default() -> Self {
        Self {
            url: default_sidecar_url(),
            load_timeout_secs: default_load_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Synthetic 后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticSection {
    #[serde(default = "default_synthetic_rate")]
    pub sample_rate: u32,

    /// 模拟的逐字符延迟（毫秒）
    #[serde(default)]
    pub latency_per_char_ms: u64,

    /// 模拟的加载耗时（毫秒）
    #[serde(default)]
    pub load_delay_ms: u64,
}

fn default_synthetic_rate() -> u32 {
    24000
}

impl Default for SyntheticSection {
    fn default() -> Self {
        Self {
            sample_rate: default_synthetic_rate(),
            latency_per_char_ms: 0,
            load_delay_ms: 0,
        }
    }
}

/// 请求限制
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// 规范化后文本最大字符数
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// 参考音色最大时长（秒）
    #[serde(default = "default_max_reference_secs")]
    pub max_reference_secs: f64,

    /// 声音转换源音频最大时长（秒）
    #[serde(default = "default_max_source_secs")]
    pub max_source_secs: f64,

    /// 参考音频最大字节数
    #[serde(default = "default_max_reference_bytes")]
    pub max_reference_bytes: usize,

    /// 是否允许 http(s) 参考音频（默认关闭，避免被用来访问本机 sidecar 等内网地址）
    #[serde(default)]
    pub allow_remote_references: bool,

    /// 是否允许本地路径参考音频（audio_prompt_path）
    #[serde(default)]
    pub allow_local_paths: bool,

    /// 远程参考音频下载超时（秒）
    #[serde(default = "default_fetch_timeout")]
    pub reference_fetch_timeout_secs: u64,
}

fn default_max_text_chars() -> usize {
    2000
}

fn default_max_reference_secs() -> f64 {
    30.0
}

fn default_max_source_secs() -> f64 {
    120.0
}

fn default_max_reference_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            max_reference_secs: default_max_reference_secs(),
            max_source_secs: default_max_source_secs(),
            max_reference_bytes: default_max_reference_bytes(),
            allow_remote_references: false,
            allow_local_paths: false,
            reference_fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// 执行器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// 等待队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 默认排队截止时间（秒）
    #[serde(default = "default_queue_timeout")]
    pub queue_timeout_secs: u64,

    /// 单次合成超时（秒）
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// 是否允许多个任务同时占用 GPU
    #[serde(default)]
    pub concurrent_inference: bool,

    /// 开启并发推理时的并发数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_queue_timeout() -> u64 {
    120
}

fn default_synthesis_timeout() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    2
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            queue_timeout_secs: default_queue_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            concurrent_inference: false,
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl ExecutorSection {
    /// 实际的 GPU 并发数
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrent_inference {
            self.max_concurrent.max(1)
        } else {
            1
        }
    }
}

/// 音频输出配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Opus 默认码率（bps）
    #[serde(default = "default_bitrate")]
    pub default_bitrate: u32,
}

fn default_bitrate() -> u32 {
    32000
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_bitrate: default_bitrate(),
        }
    }
}

/// 任务追踪配置
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// 保留的已结束任务数
    #[serde(default = "default_max_finished")]
    pub max_finished: usize,
}

fn default_max_finished() -> usize {
    1000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_finished: default_max_finished(),
        }
    }
}

/// Worker 运行方式
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// 设置后执行该文件中的任务并退出，不启动 HTTP 服务
    #[serde(default)]
    pub test_input: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否使用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.backend, ModelBackend::Sidecar);
        assert_eq!(config.model.device, "auto");
        assert_eq!(config.limits.max_text_chars, 2000);
        assert!(!config.limits.allow_remote_references);
        assert!(!config.limits.allow_local_paths);
        assert_eq!(config.executor.queue_capacity, 64);
        assert!(config.worker.test_input.is_none());
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_effective_concurrency() {
        let mut executor = ExecutorSection::default();
        assert_eq!(executor.effective_concurrency(), 1);

        executor.concurrent_inference = true;
        executor.max_concurrent = 3;
        assert_eq!(executor.effective_concurrency(), 3);
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let model: ModelConfig = serde_json::from_str(r#"{"backend": "synthetic"}"#).unwrap();
        assert_eq!(model.backend, ModelBackend::Synthetic);
        assert_eq!(model.backend.as_str(), "synthetic");
    }
}
