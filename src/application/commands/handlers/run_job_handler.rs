//! Job Dispatcher - 推理任务入口
//!
//! 校验 → 确保模型就绪 → GPU 执行 → 编码 → base64，所有错误都映射为 FAILED 响应

use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use std::time::Instant;

use super::RequestValidator;
use crate::application::commands::{JobOutput, ResponsePayload, RunJobCommand};
use crate::application::error::JobError;
use crate::application::health::WorkerHealth;
use crate::application::ports::{
    AudioEncoderPort, EncodingError, JobState, JobTrackerPort, ModelProviderPort,
    SynthesisExecutorPort,
};
use crate::domain::synthesis::{InferenceJob, JobId, ValidationError};

/// RunJob Handler - 任务调度器
pub struct RunJobHandler {
    validator: Arc<RequestValidator>,
    models: Arc<dyn ModelProviderPort>,
    executor: Arc<dyn SynthesisExecutorPort>,
    encoder: Arc<dyn AudioEncoderPort>,
    tracker: Arc<dyn JobTrackerPort>,
    health: Arc<WorkerHealth>,
}

impl RunJobHandler {
    pub fn new(
        validator: Arc<RequestValidator>,
        models: Arc<dyn ModelProviderPort>,
        executor: Arc<dyn SynthesisExecutorPort>,
        encoder: Arc<dyn AudioEncoderPort>,
        tracker: Arc<dyn JobTrackerPort>,
        health: Arc<WorkerHealth>,
    ) -> Self {
        Self {
            validator,
            models,
            executor,
            encoder,
            tracker,
            health,
        }
    }

    /// 处理一个任务，恰好返回一个完整的响应负载
    pub async fn handle(&self, cmd: RunJobCommand) -> ResponsePayload {
        if let Err(response) = self.accept(&cmd) {
            return response;
        }
        self.process(cmd).await
    }

    /// 登记任务；同 ID 的任务仍在进行时直接返回拒绝响应
    ///
    /// 异步入口先同步调用它，再把 `process` 放到后台，保证状态查询立即可见
    pub fn accept(&self, cmd: &RunJobCommand) -> Result<(), ResponsePayload> {
        self.tracker.register(&cmd.job_id).map_err(|e| {
            tracing::warn!(job_id = %cmd.job_id, error = %e, "Rejecting duplicate job");
            let err = JobError::from(ValidationError::malformed(e.to_string()));
            ResponsePayload::failed(&cmd.job_id, &err)
        })
    }

    /// 执行已登记的任务
    pub async fn process(&self, cmd: RunJobCommand) -> ResponsePayload {
        let job_id = cmd.job_id;
        let started = Instant::now();

        let (state, response) = match self.run(&job_id, &cmd.payload).await {
            Ok(output) => {
                tracing::info!(
                    job_id = %job_id,
                    model_type = %output.model_type,
                    format = %output.format,
                    duration_seconds = output.duration_seconds,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                );
                (JobState::Completed, ResponsePayload::completed(&job_id, output))
            }
            Err(err) => {
                if err.is_worker_fatal() {
                    self.health.mark_fatal(err.kind(), err.to_string());
                }
                if err.is_rejection() {
                    tracing::info!(job_id = %job_id, kind = err.kind(), error = %err, "Job rejected");
                } else {
                    tracing::error!(
                        job_id = %job_id,
                        kind = err.kind(),
                        retryable = err.retryable(),
                        error = %err,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                }
                let state = if err.is_rejection() {
                    JobState::Rejected
                } else {
                    JobState::Failed
                };
                (state, ResponsePayload::failed(&job_id, &err))
            }
        };

        self.tracker.finish(&job_id, state, response.clone());
        response
    }

    async fn run(
        &self,
        job_id: &JobId,
        payload: &serde_json::Value,
    ) -> Result<JobOutput, JobError> {
        self.tracker.transition(job_id, JobState::Validating);
        let job = self.validator.validate(job_id.clone(), payload).await?;

        // 不支持的输出格式在占用 GPU 之前失败
        let format = job.output().format;
        if !self.encoder.supports_format(format) {
            return Err(EncodingError::UnsupportedFormat(format.to_string()).into());
        }

        let variant = job.variant();
        if !self.models.is_ready(variant) {
            self.tracker.transition(job_id, JobState::ModelLoading);
            tracing::info!(job_id = %job_id, variant = %variant, "Waiting for model load");
        }
        let model = self.models.ensure_ready(variant).await?;

        self.tracker.transition(job_id, JobState::Queued);
        let result = self.executor.execute(&job, model).await?;

        self.tracker.transition(job_id, JobState::Encoding);
        let warnings = result.warnings().to_vec();
        let encoder = self.encoder.clone();
        let spec = job.output().clone();
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(&result, &spec))
            .await
            .map_err(|e| JobError::internal(format!("encoder task failed: {}", e)))??;

        Ok(build_output(&job, encoded, warnings))
    }
}

fn build_output(
    job: &InferenceJob,
    encoded: crate::application::ports::EncodedAudio,
    warnings: Vec<String>,
) -> JobOutput {
    JobOutput {
        audio_base64: STANDARD.encode(&encoded.data),
        sample_rate: encoded.sample_rate,
        duration_seconds: encoded.duration_secs,
        format: encoded.format.as_str().to_string(),
        channels: encoded.channels,
        mode: job.input().mode().as_str().to_string(),
        model_type: job.variant().as_str().to_string(),
        language_id: job.input().language().map(|l| l.as_str().to_string()),
        voice_cloned: job.input().is_voice_cloned(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::handlers::ValidatorConfig;
    use crate::application::ports::{
        DeviceError, EncodedAudio, EncodingError, ExecutionError, ExecutorStats, JobCounts,
        JobRecord, LoadError, ModelHandle, ModelStatus, ReferenceAudioError, ReferenceAudioPort,
        SynthesisModel, SynthesisRequest, TrackerError,
    };
    use crate::domain::synthesis::{
        AudioFormat, ModelVariant, OutputSpec, ReferenceAudio, SynthesisResult,
    };
    use async_trait::async_trait;
    use dashmap::DashMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct NoReferences;

    #[async_trait]
    impl ReferenceAudioPort for NoReferences {
        async fn resolve(&self, _source: &str) -> Result<Vec<u8>, ReferenceAudioError> {
            Err(ReferenceAudioError::NotAllowed("test".into()))
        }

        fn probe(&self, _bytes: Vec<u8>, _max: f64) -> Result<ReferenceAudio, ReferenceAudioError> {
            Err(ReferenceAudioError::Empty)
        }
    }

    struct ToneModel;

    #[async_trait]
    impl SynthesisModel for ToneModel {
        fn variant(&self) -> ModelVariant {
            ModelVariant::English
        }

        fn sample_rate(&self) -> u32 {
            24000
        }

        async fn synthesize(
            &self,
            _request: SynthesisRequest,
            _cancel: CancellationToken,
        ) -> Result<SynthesisResult, DeviceError> {
            Ok(SynthesisResult::new(vec![0.1; 2400], 24000, 1))
        }
    }

    /// 可配置结果的模型提供者
    struct StubModels {
        load_error: Option<LoadError>,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ModelProviderPort for StubModels {
        async fn ensure_ready(
            &self,
            _variant: ModelVariant,
        ) -> Result<Arc<ModelHandle>, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match &self.load_error {
                Some(e) => Err(e.clone()),
                None => Ok(Arc::new(ModelHandle::new(
                    Arc::new(ToneModel),
                    std::time::Duration::ZERO,
                ))),
            }
        }

        fn is_ready(&self, _variant: ModelVariant) -> bool {
            false
        }

        fn status(&self, _variant: ModelVariant) -> ModelStatus {
            ModelStatus::NotLoaded
        }
    }

    /// 直接调用模型的执行器，或返回预设错误
    struct DirectExecutor {
        fail_with: Option<fn() -> ExecutionError>,
    }

    #[async_trait]
    impl SynthesisExecutorPort for DirectExecutor {
        async fn execute(
            &self,
            job: &InferenceJob,
            model: Arc<ModelHandle>,
        ) -> Result<SynthesisResult, ExecutionError> {
            if let Some(make) = self.fail_with {
                return Err(make());
            }
            let request = SynthesisRequest {
                job_id: job.id().to_string(),
                input: job.input().clone(),
                options: job.options().clone(),
            };
            model
                .model()
                .synthesize(request, CancellationToken::new())
                .await
                .map_err(|e| ExecutionError::GpuFault(e.to_string()))
        }

        fn stats(&self) -> ExecutorStats {
            ExecutorStats {
                waiting: 0,
                running: 0,
                permits: 1,
                queue_capacity: 1,
            }
        }
    }

    struct BytesEncoder;

    impl AudioEncoderPort for BytesEncoder {
        fn encode(
            &self,
            result: &SynthesisResult,
            spec: &OutputSpec,
        ) -> Result<EncodedAudio, EncodingError> {
            if spec.format == AudioFormat::Mp3 {
                return Err(EncodingError::UnsupportedFormat("mp3".into()));
            }
            Ok(EncodedAudio {
                data: vec![1, 2, 3],
                format: spec.format,
                sample_rate: result.sample_rate(),
                channels: result.channels(),
                duration_secs: result.duration_secs(),
            })
        }

        fn supports_format(&self, format: AudioFormat) -> bool {
            format != AudioFormat::Mp3
        }
    }

    #[derive(Default)]
    struct RecordingTracker {
        states: DashMap<String, Vec<JobState>>,
    }

    impl JobTrackerPort for RecordingTracker {
        fn register(&self, job_id: &JobId) -> Result<(), TrackerError> {
            self.states
                .insert(job_id.to_string(), vec![JobState::Received]);
            Ok(())
        }

        fn transition(&self, job_id: &JobId, state: JobState) {
            if let Some(mut states) = self.states.get_mut(job_id.as_str()) {
                states.push(state);
            }
        }

        fn finish(&self, job_id: &JobId, state: JobState, _response: ResponsePayload) {
            self.transition(job_id, state);
        }

        fn get(&self, _job_id: &str) -> Option<JobRecord> {
            None
        }

        fn counts(&self) -> JobCounts {
            JobCounts::default()
        }
    }

    struct Fixture {
        handler: RunJobHandler,
        models: Arc<StubModels>,
        tracker: Arc<RecordingTracker>,
        health: Arc<WorkerHealth>,
    }

    fn fixture(
        load_error: Option<LoadError>,
        fail_with: Option<fn() -> ExecutionError>,
    ) -> Fixture {
        let tracker = Arc::new(RecordingTracker::default());
        let health = Arc::new(WorkerHealth::new());
        let models = Arc::new(StubModels {
            load_error,
            loads: AtomicUsize::new(0),
        });
        let handler = RunJobHandler::new(
            Arc::new(RequestValidator::new(
                Arc::new(NoReferences),
                ValidatorConfig::default(),
            )),
            models.clone(),
            Arc::new(DirectExecutor { fail_with }),
            Arc::new(BytesEncoder),
            tracker.clone(),
            health.clone(),
        );
        Fixture {
            handler,
            models,
            tracker,
            health,
        }
    }

    fn command(payload: serde_json::Value) -> RunJobCommand {
        RunJobCommand::from_payload(payload)
    }

    #[tokio::test]
    async fn test_completed_job() {
        let f = fixture(None, None);
        let response = f
            .handler
            .handle(command(json!({"id": "j1", "input": {"text": "Hello world"}})))
            .await;

        match response {
            ResponsePayload::Completed { id, output } => {
                assert_eq!(id, "j1");
                assert_eq!(output.audio_base64, STANDARD.encode([1u8, 2, 3]));
                assert_eq!(output.sample_rate, 24000);
                assert_eq!(output.format, "wav");
                assert_eq!(output.mode, "tts");
                assert_eq!(output.model_type, "english");
                assert!(!output.voice_cloned);
                assert!(output.duration_seconds > 0.0);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let states = f.tracker.states.get("j1").unwrap().clone();
        assert_eq!(
            states,
            vec![
                JobState::Received,
                JobState::Validating,
                JobState::ModelLoading,
                JobState::Queued,
                JobState::Encoding,
                JobState::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let f = fixture(None, None);
        let response = f
            .handler
            .handle(command(json!({"id": "j2", "input": {"text": ""}})))
            .await;

        let error = response.error().unwrap();
        assert_eq!(error.kind, "EmptyText");
        assert!(!error.retryable);
        assert_eq!(
            f.tracker.states.get("j2").unwrap().last(),
            Some(&JobState::Rejected)
        );
        assert!(f.health.is_healthy());
    }

    #[tokio::test]
    async fn test_load_error_marks_worker_unhealthy() {
        let f = fixture(Some(LoadError::WeightsMissing("english".into())), None);
        let response = f
            .handler
            .handle(command(json!({"input": {"text": "hi"}})))
            .await;

        assert_eq!(response.error().unwrap().kind, "LoadError");
        assert!(!f.health.is_healthy());
    }

    #[tokio::test]
    async fn test_execution_errors_are_mapped() {
        let f = fixture(None, Some(|| ExecutionError::GpuOutOfMemory("CUDA OOM".into())));
        let response = f
            .handler
            .handle(command(json!({"input": {"text": "hi"}})))
            .await;
        let error = response.error().unwrap();
        assert_eq!(error.kind, "GpuOutOfMemory");
        assert!(error.retryable);
        assert!(f.health.is_healthy());

        let f = fixture(None, Some(|| ExecutionError::GpuFault("xid".into())));
        let response = f
            .handler
            .handle(command(json!({"input": {"text": "hi"}})))
            .await;
        assert_eq!(response.error().unwrap().kind, "GpuFault");
        assert!(!f.health.is_healthy());
    }

    #[tokio::test]
    async fn test_unsupported_format_is_encoding_error() {
        let f = fixture(None, None);
        let response = f
            .handler
            .handle(command(
                json!({"input": {"text": "hi", "output_format": "mp3"}}),
            ))
            .await;
        assert_eq!(response.error().unwrap().kind, "EncodingError");
        assert_eq!(f.models.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_still_gets_response() {
        let f = fixture(None, None);
        let response = f.handler.handle(command(json!(null))).await;
        assert!(!response.id().is_empty());
        assert_eq!(response.error().unwrap().kind, "MalformedPayload");
    }
}
