//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ModelBackend};
use crate::domain::synthesis::ModelVariant;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `RUNVOICE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值（模型缓存目录与下载加速取自 `HF_HOME` / `HF_HUB_ENABLE_HF_TRANSFER`）
///
/// # 环境变量示例
/// - `RUNVOICE_SERVER__PORT=8080`
/// - `RUNVOICE_MODEL__BACKEND=synthetic`
/// - `RUNVOICE_SIDECAR__URL=http://127.0.0.1:9000`
/// - `RUNVOICE_WORKER__TEST_INPUT=test_input.json`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("model.backend", "sidecar")?
        .set_default("model.device", "auto")?
        .set_default("model.hf_transfer", hf_transfer_from_env())?
        .set_default("sidecar.url", "http://127.0.0.1:9000")?
        .set_default("sidecar.load_timeout_secs", 900)?
        .set_default("sidecar.request_timeout_secs", 600)?
        .set_default("synthetic.sample_rate", 24000)?
        .set_default("limits.max_text_chars", 2000)?
        .set_default("limits.max_reference_secs", 30.0)?
        .set_default("limits.max_source_secs", 120.0)?
        .set_default("limits.max_reference_bytes", 10 * 1024 * 1024)?
        .set_default("limits.allow_remote_references", false)?
        .set_default("limits.allow_local_paths", false)?
        .set_default("executor.queue_capacity", 64)?
        .set_default("executor.queue_timeout_secs", 120)?
        .set_default("executor.synthesis_timeout_secs", 300)?
        .set_default("executor.concurrent_inference", false)?
        .set_default("audio.default_bitrate", 32000)?
        .set_default("tracker.max_finished", 1000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Ok(hf_home) = std::env::var("HF_HOME") {
        if !hf_home.is_empty() {
            builder = builder.set_default("model.cache_dir", hf_home)?;
        }
    }

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量
    // 例如: RUNVOICE_EXECUTOR__QUEUE_CAPACITY=16
    // model.preload 以逗号分隔: RUNVOICE_MODEL__PRELOAD=english,multilingual
    builder = builder.add_source(
        Environment::with_prefix("RUNVOICE")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("model.preload")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn hf_transfer_from_env() -> bool {
    std::env::var("HF_HUB_ENABLE_HF_TRANSFER")
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if !matches!(config.model.device.as_str(), "auto" | "cuda" | "mps" | "cpu") {
        return Err(ConfigError::ValidationError(format!(
            "Unknown device `{}` (expected auto, cuda, mps or cpu)",
            config.model.device
        )));
    }

    for name in &config.model.preload {
        if ModelVariant::from_str(name).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Unknown model variant `{}` in model.preload",
                name
            )));
        }
    }

    if config.sidecar.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Sidecar URL cannot be empty".to_string(),
        ));
    }

    if config.limits.max_text_chars == 0 {
        return Err(ConfigError::ValidationError(
            "limits.max_text_chars cannot be 0".to_string(),
        ));
    }

    if config.limits.max_reference_secs <= 0.0 || config.limits.max_source_secs <= 0.0 {
        return Err(ConfigError::ValidationError(
            "Reference duration limits must be positive".to_string(),
        ));
    }

    if config.executor.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "executor.queue_capacity cannot be 0".to_string(),
        ));
    }

    if config.executor.synthesis_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "executor.synthesis_timeout_secs cannot be 0".to_string(),
        ));
    }

    // sidecar 的 HTTP 超时必须晚于执行器超时，否则请求会在 GPU 仍忙时被丢弃
    if config.model.backend == ModelBackend::Sidecar
        && config.sidecar.request_timeout_secs <= config.executor.synthesis_timeout_secs
    {
        return Err(ConfigError::ValidationError(format!(
            "sidecar.request_timeout_secs ({}) must be greater than executor.synthesis_timeout_secs ({})",
            config.sidecar.request_timeout_secs, config.executor.synthesis_timeout_secs
        )));
    }

    if config.synthetic.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "synthetic.sample_rate cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Worker Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Model Backend: {}", config.model.backend.as_str());
    tracing::info!("Device: {}", config.model.device);
    if let Some(cache_dir) = &config.model.cache_dir {
        tracing::info!("Model Cache: {}", cache_dir);
    }
    tracing::info!("HF Transfer: {}", config.model.hf_transfer);
    if !config.model.preload.is_empty() {
        tracing::info!("Preload: {}", config.model.preload.join(", "));
    }
    tracing::info!("Sidecar URL: {}", config.sidecar.url);
    tracing::info!("Max Text Chars: {}", config.limits.max_text_chars);
    tracing::info!(
        "Queue: capacity={}, timeout={}s",
        config.executor.queue_capacity,
        config.executor.queue_timeout_secs
    );
    tracing::info!("Synthesis Timeout: {}s", config.executor.synthesis_timeout_secs);
    tracing::info!(
        "GPU Concurrency: {}",
        config.executor.effective_concurrency()
    );
    if let Some(path) = &config.worker.test_input {
        tracing::info!("Test Input: {}", path.display());
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("============================");
}
