//! Sidecar Model - 通过本地 HTTP 驱动 GPU 推理进程
//!
//! 模型权重常驻在同机的推理进程中，本进程只负责调度：
//!
//! POST {base_url}/api/tts/load
//! Request: {"variant": "english", "device": "auto", "cache_dir": "...", "hf_transfer": false}
//! Response: {"sample_rate": 24000, "device": "cuda"}
//!
//! POST {base_url}/api/tts/infer
//! Request: {"variant": "...", "text": "...", "temperature": 0.8, ...}  (JSON)
//! Response: audio/wav binary, metadata in headers
//!
//! POST {base_url}/api/tts/cancel
//! Request: {"job_id": "..."}
//!
//! 错误响应: {"code": "out_of_memory", "message": "..."}

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    DeviceError, LoadError, ModelSourcePort, SynthesisModel, SynthesisRequest,
};
use crate::domain::synthesis::{ModelVariant, SynthesisInput, SynthesisResult};

/// Sidecar 配置
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// 推理进程基础 URL
    pub base_url: String,
    /// 加载超时（首次加载可能需要下载权重）
    pub load_timeout: Duration,
    /// 单次推理的 HTTP 超时
    pub request_timeout: Duration,
    /// 设备（auto / cuda / mps / cpu）
    pub device: String,
    /// 模型缓存目录
    pub cache_dir: Option<String>,
    /// 是否启用下载加速
    pub hf_transfer: bool,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            load_timeout: Duration::from_secs(900),
            request_timeout: Duration::from_secs(600),
            device: "auto".to_string(),
            cache_dir: None,
            hf_transfer: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoadHttpRequest<'a> {
    variant: &'a str,
    device: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_dir: Option<&'a str>,
    hf_transfer: bool,
}

#[derive(Debug, Deserialize)]
struct LoadHttpResponse {
    sample_rate: u32,
    #[serde(default)]
    device: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SidecarErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// 推理请求体 (JSON)
#[derive(Debug, Serialize)]
struct InferHttpRequest<'a> {
    variant: &'a str,
    job_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_prompt_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_voice_base64: Option<String>,
    temperature: f32,
    top_p: f32,
    min_p: f32,
    repetition_penalty: f32,
    exaggeration: f32,
    cfg_weight: f32,
    speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl<'a> InferHttpRequest<'a> {
    fn from_request(variant: ModelVariant, request: &'a SynthesisRequest) -> Self {
        let options = &request.options;
        let mut body = Self {
            variant: variant.as_str(),
            job_id: &request.job_id,
            text: None,
            language_id: None,
            audio_prompt_base64: None,
            source_audio_base64: None,
            target_voice_base64: None,
            temperature: options.temperature,
            top_p: options.top_p,
            min_p: options.min_p,
            repetition_penalty: options.repetition_penalty,
            exaggeration: options.exaggeration,
            cfg_weight: options.cfg_weight,
            speed: options.speed,
            seed: options.seed,
        };

        match &request.input {
            SynthesisInput::Speech {
                text,
                language,
                voice_reference,
            } => {
                body.text = Some(text.as_str());
                body.language_id = language.as_ref().map(|l| l.as_str());
                body.audio_prompt_base64 = voice_reference.as_ref().map(|r| STANDARD.encode(r.bytes()));
            }
            SynthesisInput::VoiceConversion { source, target } => {
                body.source_audio_base64 = Some(STANDARD.encode(source.bytes()));
                body.target_voice_base64 = Some(STANDARD.encode(target.bytes()));
            }
        }
        body
    }
}

#[derive(Debug, Serialize)]
struct CancelHttpRequest<'a> {
    job_id: &'a str,
}

/// 读取错误响应体
async fn error_body(response: reqwest::Response) -> SidecarErrorBody {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(SidecarErrorBody {
        code: String::new(),
        message: text,
    })
}

/// Sidecar 模型来源
pub struct SidecarModelSource {
    client: Client,
    config: SidecarConfig,
}

impl SidecarModelSource {
    pub fn new(config: SidecarConfig) -> Result<Self, LoadError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LoadError::Other(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn load_url(&self) -> String {
        format!("{}/api/tts/load", self.config.base_url.trim_end_matches('/'))
    }

    /// 推理进程是否可达
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn load_error_from(status: StatusCode, body: SidecarErrorBody) -> LoadError {
    let detail = if body.message.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.message
    };
    match body.code.as_str() {
        "weights_missing" => LoadError::WeightsMissing(detail),
        "weights_corrupted" => LoadError::WeightsCorrupted(detail),
        "out_of_memory" => LoadError::InsufficientMemory(detail),
        "hub_unreachable" => LoadError::SourceUnreachable(detail),
        _ => LoadError::Other(format!("HTTP {}: {}", status, detail)),
    }
}

#[async_trait]
impl ModelSourcePort for SidecarModelSource {
    async fn load(&self, variant: ModelVariant) -> Result<Arc<dyn SynthesisModel>, LoadError> {
        let body = LoadHttpRequest {
            variant: variant.as_str(),
            device: &self.config.device,
            cache_dir: self.config.cache_dir.as_deref(),
            hf_transfer: self.config.hf_transfer,
        };

        tracing::debug!(url = %self.load_url(), variant = %variant, "Sending model load request");

        let response = self
            .client
            .post(self.load_url())
            .timeout(self.config.load_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LoadError::SourceUnreachable(format!("cannot connect to sidecar: {}", e))
                } else if e.is_timeout() {
                    LoadError::Other(format!(
                        "load did not finish within {}s",
                        self.config.load_timeout.as_secs()
                    ))
                } else {
                    LoadError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(load_error_from(status, error_body(response).await));
        }

        let loaded: LoadHttpResponse = response
            .json()
            .await
            .map_err(|e| LoadError::Other(format!("invalid load response: {}", e)))?;

        tracing::info!(
            variant = %variant,
            sample_rate = loaded.sample_rate,
            device = loaded.device.as_deref().unwrap_or("unknown"),
            "Sidecar model loaded"
        );

        Ok(Arc::new(SidecarModel {
            client: self.client.clone(),
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            request_timeout: self.config.request_timeout,
            variant,
            sample_rate: loaded.sample_rate,
        }))
    }

    fn describe(&self) -> String {
        format!("sidecar {}", self.config.base_url)
    }
}

/// Sidecar 模型
pub struct SidecarModel {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    variant: ModelVariant,
    sample_rate: u32,
}

impl SidecarModel {
    fn infer_url(&self) -> String {
        format!("{}/api/tts/infer", self.base_url)
    }

    /// 传输层错误：超时说明 sidecar 仍在忙，不代表 GPU 故障
    fn transport_error(&self, context: &str, err: reqwest::Error) -> DeviceError {
        if err.is_timeout() {
            DeviceError::Timeout(self.request_timeout)
        } else {
            DeviceError::Fault(format!("{}: {}", context, err))
        }
    }

    /// 尽力通知 sidecar 提前结束该任务的前向计算
    async fn request_cancel(&self, job_id: &str) {
        let url = format!("{}/api/tts/cancel", self.base_url);
        let result = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(5))
            .json(&CancelHttpRequest { job_id })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(job_id, "Sidecar acknowledged cancellation")
            }
            Ok(response) => {
                tracing::warn!(job_id, status = %response.status(), "Sidecar rejected cancellation")
            }
            Err(e) => tracing::warn!(job_id, error = %e, "Failed to send cancellation to sidecar"),
        }
    }

    async fn infer(&self, request: &SynthesisRequest) -> Result<SynthesisResult, DeviceError> {
        let body = InferHttpRequest::from_request(self.variant, request);

        let response = self
            .client
            .post(self.infer_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error("sidecar request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(device_error_from(status, error_body(response).await));
        }

        let warnings: Vec<String> = response
            .headers()
            .get("X-TTS-Warnings")
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let audio = response
            .bytes()
            .await
            .map_err(|e| self.transport_error("failed to read audio", e))?;

        let mut result = decode_wav(&audio)?;
        for warning in warnings {
            result.push_warning(warning);
        }
        Ok(result)
    }
}

fn device_error_from(status: StatusCode, body: SidecarErrorBody) -> DeviceError {
    let detail = if body.message.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.message
    };
    if body.code == "out_of_memory" || status == StatusCode::INSUFFICIENT_STORAGE {
        DeviceError::OutOfMemory(detail)
    } else {
        DeviceError::Fault(format!("HTTP {}: {}", status, detail))
    }
}

/// 解码 sidecar 返回的 WAV
fn decode_wav(data: &[u8]) -> Result<SynthesisResult, DeviceError> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| DeviceError::Fault(format!("invalid WAV from sidecar: {}", e)))?;
    let spec = reader.spec();

    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples =
        samples.map_err(|e| DeviceError::Fault(format!("invalid WAV from sidecar: {}", e)))?;

    Ok(SynthesisResult::new(samples, spec.sample_rate, spec.channels))
}

#[async_trait]
impl SynthesisModel for SidecarModel {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<SynthesisResult, DeviceError> {
        let infer = self.infer(&request);
        tokio::pin!(infer);

        tokio::select! {
            result = &mut infer => result,
            _ = cancel.cancelled() => {
                // 断开连接不会停止 sidecar 上的计算；通知取消后继续等待，直到 GPU 空闲
                self.request_cancel(&request.job_id).await;
                match infer.await {
                    Ok(_) => tracing::debug!(
                        job_id = %request.job_id,
                        "Discarded result of cancelled synthesis"
                    ),
                    Err(e) => tracing::debug!(
                        job_id = %request.job_id,
                        error = %e,
                        "Cancelled synthesis ended with error"
                    ),
                }
                Err(DeviceError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ExecutionError, ModelHandle, SynthesisExecutorPort};
    use crate::domain::synthesis::{
        GenerationOptions, InferenceJob, JobId, OutputSpec, SynthesisText,
    };
    use crate::infrastructure::memory::InMemoryJobTracker;
    use crate::infrastructure::worker::{ExecutorConfig, FifoSynthesisExecutor};
    use axum::{
        extract::State,
        http::StatusCode as HttpStatus,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// 进程内的假推理进程：记录同时在跑的前向计算数
    struct FakeGpu {
        work: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        finished: AtomicUsize,
        cancelled: Mutex<Vec<String>>,
    }

    impl FakeGpu {
        fn new(work: Duration) -> Arc<Self> {
            Arc::new(Self {
                work,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                cancelled: Mutex::new(Vec::new()),
            })
        }
    }

    fn wav_bytes(frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample((i % 100) as i16 * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    async fn fake_load() -> Json<Value> {
        Json(json!({"sample_rate": 24000, "device": "cuda"}))
    }

    async fn fake_infer(State(gpu): State<Arc<FakeGpu>>, Json(body): Json<Value>) -> Response {
        if body["text"] == "oom" {
            return (
                HttpStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"code": "out_of_memory", "message": "CUDA out of memory"})),
            )
                .into_response();
        }

        // 前向计算在独立任务里跑，客户端断开后依然会跑完
        let forward = {
            let gpu = gpu.clone();
            tokio::spawn(async move {
                let now = gpu.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                gpu.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(gpu.work).await;
                gpu.in_flight.fetch_sub(1, Ordering::SeqCst);
                gpu.finished.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _ = forward.await;

        (
            [
                ("content-type", "audio/wav"),
                ("x-tts-warnings", "text truncated; "),
            ],
            wav_bytes(2400),
        )
            .into_response()
    }

    async fn fake_cancel(State(gpu): State<Arc<FakeGpu>>, Json(body): Json<Value>) -> HttpStatus {
        if let Some(job_id) = body["job_id"].as_str() {
            gpu.cancelled.lock().unwrap().push(job_id.to_string());
        }
        HttpStatus::ACCEPTED
    }

    async fn spawn_sidecar(gpu: Arc<FakeGpu>) -> String {
        let app = Router::new()
            .route("/api/tts/load", post(fake_load))
            .route("/api/tts/infer", post(fake_infer))
            .route("/api/tts/cancel", post(fake_cancel))
            .with_state(gpu);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn load_model(base_url: String, request_timeout: Duration) -> Arc<dyn SynthesisModel> {
        SidecarModelSource::new(SidecarConfig {
            base_url,
            request_timeout,
            ..Default::default()
        })
        .unwrap()
        .load(ModelVariant::English)
        .await
        .unwrap()
    }

    fn speech(text: &str) -> SynthesisInput {
        SynthesisInput::Speech {
            text: SynthesisText::new(text, 100).unwrap(),
            language: None,
            voice_reference: None,
        }
    }

    fn request(job_id: &str, text: &str) -> SynthesisRequest {
        SynthesisRequest {
            job_id: job_id.to_string(),
            input: speech(text),
            options: GenerationOptions::default(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = SidecarConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.device, "auto");
    }

    #[test]
    fn test_load_error_codes() {
        let body = |code: &str| SidecarErrorBody {
            code: code.to_string(),
            message: "detail".to_string(),
        };
        let status = StatusCode::INTERNAL_SERVER_ERROR;

        assert!(matches!(
            load_error_from(status, body("weights_missing")),
            LoadError::WeightsMissing(_)
        ));
        assert!(matches!(
            load_error_from(status, body("weights_corrupted")),
            LoadError::WeightsCorrupted(_)
        ));
        assert!(matches!(
            load_error_from(status, body("out_of_memory")),
            LoadError::InsufficientMemory(_)
        ));
        assert!(matches!(
            load_error_from(status, body("hub_unreachable")),
            LoadError::SourceUnreachable(_)
        ));
        assert!(matches!(
            load_error_from(status, SidecarErrorBody::default()),
            LoadError::Other(_)
        ));
    }

    #[test]
    fn test_device_error_mapping() {
        let oom = SidecarErrorBody {
            code: "out_of_memory".into(),
            message: "CUDA out of memory".into(),
        };
        assert!(matches!(
            device_error_from(StatusCode::INTERNAL_SERVER_ERROR, oom),
            DeviceError::OutOfMemory(_)
        ));
        assert!(matches!(
            device_error_from(StatusCode::INSUFFICIENT_STORAGE, SidecarErrorBody::default()),
            DeviceError::OutOfMemory(_)
        ));
        assert!(matches!(
            device_error_from(StatusCode::INTERNAL_SERVER_ERROR, SidecarErrorBody::default()),
            DeviceError::Fault(_)
        ));
    }

    #[test]
    fn test_decode_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0i16, 16384, -16384, i16::MAX] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let result = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(result.sample_rate(), 24000);
        assert_eq!(result.frames(), 4);
        assert!((result.samples()[1] - 0.5).abs() < 1e-4);
        assert!((result.samples()[2] + 0.5).abs() < 1e-4);

        assert!(decode_wav(b"not a wav").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_is_load_error() {
        let source = SidecarModelSource::new(SidecarConfig {
            // 保留端口，连接会被拒绝
            base_url: "http://127.0.0.1:9".to_string(),
            load_timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap();

        assert!(source.load(ModelVariant::English).await.is_err());
        assert!(!source.health_check().await);
    }

    #[tokio::test]
    async fn test_synthesize_over_http() {
        let gpu = FakeGpu::new(Duration::from_millis(10));
        let model = load_model(spawn_sidecar(gpu.clone()).await, Duration::from_secs(5)).await;
        assert_eq!(model.sample_rate(), 24000);

        let result = model
            .synthesize(request("job-1", "hello"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.sample_rate(), 24000);
        assert_eq!(result.frames(), 2400);
        assert_eq!(result.warnings().to_vec(), vec!["text truncated".to_string()]);
        assert_eq!(gpu.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_out_of_memory_over_http() {
        let gpu = FakeGpu::new(Duration::ZERO);
        let model = load_model(spawn_sidecar(gpu).await, Duration::from_secs(5)).await;

        let err = model
            .synthesize(request("job-1", "oom"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory(msg) if msg.contains("CUDA")));
    }

    #[tokio::test]
    async fn test_request_timeout_is_not_a_fault() {
        let gpu = FakeGpu::new(Duration::from_millis(500));
        let model = load_model(spawn_sidecar(gpu).await, Duration::from_millis(100)).await;

        let err = model
            .synthesize(request("job-1", "hello"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cancel_waits_for_sidecar_to_finish() {
        let gpu = FakeGpu::new(Duration::from_millis(400));
        let model = load_model(spawn_sidecar(gpu.clone()).await, Duration::from_secs(5)).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = model
            .synthesize(request("job-a", "hello"), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::Cancelled));
        assert!(started.elapsed() >= Duration::from_millis(350));
        assert_eq!(gpu.finished.load(Ordering::SeqCst), 1);
        assert_eq!(*gpu.cancelled.lock().unwrap(), vec!["job-a".to_string()]);
    }

    #[tokio::test]
    async fn test_executor_timeout_keeps_sidecar_exclusive() {
        let gpu = FakeGpu::new(Duration::from_millis(400));
        let model = load_model(spawn_sidecar(gpu.clone()).await, Duration::from_secs(5)).await;
        let handle = Arc::new(ModelHandle::new(model, Duration::ZERO));
        let executor = FifoSynthesisExecutor::new(
            ExecutorConfig {
                synthesis_timeout: Duration::from_millis(100),
                ..Default::default()
            },
            Arc::new(InMemoryJobTracker::new(16)),
        );

        let job = |id: &str| {
            InferenceJob::new(
                JobId::from_external(Some(id)),
                speech("hello"),
                GenerationOptions::default(),
                OutputSpec::default(),
                Duration::from_secs(60),
            )
        };
        let (job_a, job_b) = (job("job-a"), job("job-b"));

        let err = executor.execute(&job_a, handle.clone()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::SynthesisTimeout(_)));

        // 第二个任务必须等 sidecar 跑完上一次前向计算
        assert!(executor.execute(&job_b, handle).await.is_ok());
        assert_eq!(gpu.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(gpu.finished.load(Ordering::SeqCst), 2);
        assert!(gpu.cancelled.lock().unwrap().contains(&"job-a".to_string()));
    }
}
