//! RunVoice - 无服务器 TTS 推理 Worker
//!
//! 启动流程：配置 → 日志 → 模型后端 → 调度器 → （本地单次执行 | HTTP 服务）

use std::sync::Arc;
use std::time::Duration;

use runvoice::application::commands::handlers::{RequestValidator, ValidatorConfig};
use runvoice::application::{ModelProviderPort, ModelSourcePort, RunJobHandler, WorkerHealth};
use runvoice::config::{load_config, print_config, AppConfig, ModelBackend};
use runvoice::domain::synthesis::ModelVariant;
use runvoice::infrastructure::adapters::{
    AudioEncoderConfig, PcmAudioEncoder, ReferenceResolverConfig, SymphoniaReferenceResolver,
};
use runvoice::infrastructure::http::{AppState, HttpServer, ServerConfig};
use runvoice::infrastructure::memory::InMemoryJobTracker;
use runvoice::infrastructure::model::{
    LazyModelLoader, SidecarConfig, SidecarModelSource, SyntheticConfig, SyntheticModelSource,
};
use runvoice::infrastructure::worker::{run_test_input, ExecutorConfig, FifoSynthesisExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("RunVoice - serverless TTS worker v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 模型后端
    let source = build_model_source(&config).await?;
    let models = Arc::new(LazyModelLoader::new(source));

    // 任务追踪与 GPU 执行器
    let tracker = InMemoryJobTracker::new(config.tracker.max_finished).arc();
    let executor = Arc::new(FifoSynthesisExecutor::new(
        ExecutorConfig {
            max_concurrent: config.executor.effective_concurrency(),
            queue_capacity: config.executor.queue_capacity,
            synthesis_timeout: Duration::from_secs(config.executor.synthesis_timeout_secs),
        },
        tracker.clone(),
    ));

    // 校验器
    let references = Arc::new(SymphoniaReferenceResolver::new(ReferenceResolverConfig {
        max_bytes: config.limits.max_reference_bytes,
        fetch_timeout: Duration::from_secs(config.limits.reference_fetch_timeout_secs),
        allow_remote: config.limits.allow_remote_references,
        allow_local_paths: config.limits.allow_local_paths,
    })?);
    let validator = Arc::new(RequestValidator::new(
        references,
        ValidatorConfig {
            max_text_chars: config.limits.max_text_chars,
            max_reference_secs: config.limits.max_reference_secs,
            max_source_secs: config.limits.max_source_secs,
            queue_timeout: Duration::from_secs(config.executor.queue_timeout_secs),
        },
    ));

    let encoder = Arc::new(PcmAudioEncoder::new(AudioEncoderConfig {
        default_bitrate: config.audio.default_bitrate,
    }));
    let health = Arc::new(WorkerHealth::new());

    let handler = Arc::new(RunJobHandler::new(
        validator,
        models.clone(),
        executor.clone(),
        encoder,
        tracker.clone(),
        health.clone(),
    ));

    // 本地单次执行：输出响应后退出
    if let Some(path) = &config.worker.test_input {
        let response = run_test_input(path, &handler).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        tracing::info!(completed = response.is_completed(), "Local test input finished");
        return Ok(());
    }

    spawn_preload(&config, models.clone(), health.clone());

    let state = AppState::new(handler, models, executor, tracker, health);
    let server = HttpServer::new(
        ServerConfig::new(&config.server.host, config.server.port),
        state,
    );

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},runvoice={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_model_source(config: &AppConfig) -> anyhow::Result<Arc<dyn ModelSourcePort>> {
    match config.model.backend {
        ModelBackend::Sidecar => {
            let source = SidecarModelSource::new(SidecarConfig {
                base_url: config.sidecar.url.clone(),
                load_timeout: Duration::from_secs(config.sidecar.load_timeout_secs),
                request_timeout: Duration::from_secs(config.sidecar.request_timeout_secs),
                device: config.model.device.clone(),
                cache_dir: config.model.cache_dir.clone(),
                hf_transfer: config.model.hf_transfer,
            })?;
            if !source.health_check().await {
                tracing::warn!(
                    url = %config.sidecar.url,
                    "Inference sidecar not reachable at startup"
                );
            }
            Ok(Arc::new(source))
        }
        ModelBackend::Synthetic => Ok(Arc::new(SyntheticModelSource::new(SyntheticConfig {
            sample_rate: config.synthetic.sample_rate,
            latency_per_char: Duration::from_millis(config.synthetic.latency_per_char_ms),
            load_delay: Duration::from_millis(config.synthetic.load_delay_ms),
        }))),
    }
}

/// 后台预加载；失败时 Worker 变为不健康
fn spawn_preload(config: &AppConfig, models: Arc<LazyModelLoader>, health: Arc<WorkerHealth>) {
    let variants: Vec<ModelVariant> = config
        .model
        .preload
        .iter()
        .filter_map(|name| ModelVariant::from_str(name))
        .collect();
    if variants.is_empty() {
        return;
    }

    tokio::spawn(async move {
        for variant in variants {
            if let Err(e) = models.ensure_ready(variant).await {
                health.mark_fatal("LoadError", format!("preload of {} failed: {}", variant, e));
                return;
            }
        }
    });
}
