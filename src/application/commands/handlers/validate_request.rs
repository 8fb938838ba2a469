//! Request Validator - 任务负载校验
//!
//! 在任务接触 GPU 之前检查并规范化负载；任何失败都是调用方错误，不会重试

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::ReferenceAudioPort;
use crate::domain::synthesis::{
    AudioFormat, GenerationOptions, InferenceJob, JobId, LanguageId, OutputSpec, ReferenceAudio,
    SynthesisInput, SynthesisMode, SynthesisText, ValidationError,
};

/// 输出采样率范围
const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u64> = 8_000..=48_000;
/// Opus 比特率范围（bps）
const BITRATE_RANGE: std::ops::RangeInclusive<u64> = 6_000..=510_000;

/// 校验器配置
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// 规范化后文本最大字符数
    pub max_text_chars: usize,
    /// 参考音色最大时长（秒）
    pub max_reference_secs: f64,
    /// 声音转换源音频最大时长（秒）
    pub max_source_secs: f64,
    /// 默认排队截止时间；调用方的 deadline_ms 只能缩短它
    pub queue_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 2000,
            max_reference_secs: 30.0,
            max_source_secs: 120.0,
            queue_timeout: Duration::from_secs(120),
        }
    }
}

/// Request Validator
pub struct RequestValidator {
    references: Arc<dyn ReferenceAudioPort>,
    config: ValidatorConfig,
}

impl RequestValidator {
    pub fn new(references: Arc<dyn ReferenceAudioPort>, config: ValidatorConfig) -> Self {
        Self { references, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// 校验原始负载，得到不可变的推理任务
    ///
    /// 排队窗口在任务进入 GPU 准入队列时才开始计时，参考音频下载和模型冷启动不占用它
    pub async fn validate(
        &self,
        job_id: JobId,
        payload: &Value,
    ) -> Result<InferenceJob, ValidationError> {
        let envelope = payload
            .as_object()
            .ok_or_else(|| ValidationError::malformed("payload must be a JSON object"))?;
        let input = envelope
            .get("input")
            .and_then(Value::as_object)
            .ok_or_else(|| ValidationError::malformed("`input` object is required"))?;

        let queue_window = self.queue_window(envelope)?;
        let mode = parse_mode(input)?;
        let options = parse_options(input)?;
        let output = parse_output_spec(input)?;

        let synthesis_input = match mode {
            SynthesisMode::Tts => self.parse_speech(input).await?,
            SynthesisMode::VoiceClone => self.parse_conversion(input).await?,
        };

        tracing::debug!(
            job_id = %job_id,
            mode = synthesis_input.mode().as_str(),
            variant = %synthesis_input.variant(),
            format = %output.format,
            "Payload validated"
        );

        Ok(InferenceJob::new(
            job_id,
            synthesis_input,
            options,
            output,
            queue_window,
        ))
    }

    fn queue_window(&self, envelope: &Map<String, Value>) -> Result<Duration, ValidationError> {
        match envelope.get("deadline_ms") {
            None | Some(Value::Null) => Ok(self.config.queue_timeout),
            Some(value) => {
                let ms = value.as_u64().ok_or_else(|| {
                    ValidationError::invalid_option(
                        "deadline_ms",
                        "must be a non-negative integer",
                    )
                })?;
                Ok(Duration::from_millis(ms).min(self.config.queue_timeout))
            }
        }
    }

    async fn parse_speech(
        &self,
        input: &Map<String, Value>,
    ) -> Result<SynthesisInput, ValidationError> {
        let raw_text = match input.get("text") {
            None | Some(Value::Null) => "",
            Some(Value::String(text)) => text.as_str(),
            Some(_) => return Err(ValidationError::malformed("`text` must be a string")),
        };
        let text = SynthesisText::new(raw_text, self.config.max_text_chars)?;

        let language = optional_str(input, "language_id")?
            .map(LanguageId::new)
            .transpose()?;

        let voice_reference = match first_present(input, &["voice_reference", "voice_sample_base64"])? {
            Some((field, source)) => Some(
                self.load_reference(field, source, self.config.max_reference_secs)
                    .await?,
            ),
            None => match optional_str(input, "audio_prompt_path")? {
                Some(path) => {
                    let source = if path.starts_with("file://") {
                        path.to_string()
                    } else {
                        format!("file://{}", path)
                    };
                    Some(
                        self.load_reference(
                            "audio_prompt_path",
                            &source,
                            self.config.max_reference_secs,
                        )
                        .await?,
                    )
                }
                None => None,
            },
        };

        Ok(SynthesisInput::Speech {
            text,
            language,
            voice_reference,
        })
    }

    async fn parse_conversion(
        &self,
        input: &Map<String, Value>,
    ) -> Result<SynthesisInput, ValidationError> {
        let (source_field, source) = first_present(input, &["source_audio", "source_audio_base64"])?
            .ok_or_else(|| {
                ValidationError::malformed("`source_audio` is required in voice_clone mode")
            })?;
        let (target_field, target) = first_present(input, &["target_voice", "target_voice_base64"])?
            .ok_or_else(|| {
                ValidationError::malformed("`target_voice` is required in voice_clone mode")
            })?;

        let source = self
            .load_reference(source_field, source, self.config.max_source_secs)
            .await?;
        let target = self
            .load_reference(target_field, target, self.config.max_reference_secs)
            .await?;

        Ok(SynthesisInput::VoiceConversion { source, target })
    }

    async fn load_reference(
        &self,
        field: &str,
        source: &str,
        max_secs: f64,
    ) -> Result<ReferenceAudio, ValidationError> {
        let bytes = self
            .references
            .resolve(source)
            .await
            .map_err(|e| ValidationError::bad_reference(field, e.to_string()))?;

        // 解码探测是 CPU 密集操作，不在异步线程上执行
        let references = self.references.clone();
        let reference = tokio::task::spawn_blocking(move || references.probe(bytes, max_secs))
            .await
            .map_err(|e| ValidationError::bad_reference(field, format!("probe task failed: {}", e)))?
            .map_err(|e| ValidationError::bad_reference(field, e.to_string()))?;

        tracing::debug!(
            field,
            codec = reference.codec(),
            sample_rate = reference.sample_rate(),
            channels = reference.channels(),
            duration_secs = reference.duration_secs(),
            "Reference audio accepted"
        );
        Ok(reference)
    }
}

fn parse_mode(input: &Map<String, Value>) -> Result<SynthesisMode, ValidationError> {
    match input.get("mode") {
        None | Some(Value::Null) => Ok(SynthesisMode::default()),
        Some(Value::String(mode)) => SynthesisMode::from_str(mode.trim()).ok_or_else(|| {
            ValidationError::invalid_option("mode", format!("unknown mode `{}`", mode))
        }),
        Some(_) => Err(ValidationError::malformed("`mode` must be a string")),
    }
}

/// 生成参数：先取 input 顶层（旧版写法），再由 options 覆盖
fn parse_options(input: &Map<String, Value>) -> Result<GenerationOptions, ValidationError> {
    let mut options = GenerationOptions::default();

    for name in GenerationOptions::float_option_names() {
        if let Some(value) = input.get(name) {
            apply_option(&mut options, name, value)?;
        }
    }
    if let Some(value) = input.get("seed") {
        apply_option(&mut options, "seed", value)?;
    }

    match input.get("options") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, value) in map {
                apply_option(&mut options, name, value)?;
            }
        }
        Some(_) => {
            return Err(ValidationError::invalid_option(
                "options",
                "must be an object",
            ))
        }
    }

    Ok(options)
}

fn apply_option(
    options: &mut GenerationOptions,
    name: &str,
    value: &Value,
) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }

    if name == "seed" {
        let seed = value
            .as_u64()
            .ok_or_else(|| ValidationError::invalid_option("seed", "must be a non-negative integer"))?;
        options.seed = Some(seed);
        return Ok(());
    }

    if !GenerationOptions::float_option_names().any(|known| known == name) {
        return Err(ValidationError::invalid_option(name, "unknown option"));
    }
    let number = value
        .as_f64()
        .ok_or_else(|| ValidationError::invalid_option(name, "must be a number"))?;
    options.set_float(name, number)
}

fn parse_output_spec(input: &Map<String, Value>) -> Result<OutputSpec, ValidationError> {
    let format = match optional_str(input, "output_format")? {
        None => AudioFormat::default(),
        Some(raw) => AudioFormat::from_str(raw).ok_or_else(|| {
            ValidationError::invalid_option(
                "output_format",
                format!("unknown format `{}` (expected wav, opus or mp3)", raw),
            )
        })?,
    };

    let sample_rate = optional_u32_in(input, "sample_rate", SAMPLE_RATE_RANGE)?;
    let bitrate = optional_u32_in(input, "bitrate", BITRATE_RANGE)?;

    Ok(OutputSpec {
        format,
        sample_rate,
        bitrate,
    })
}

fn optional_str<'a>(
    input: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match input.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(ValidationError::invalid_option(field, "must be a string")),
    }
}

fn optional_u32_in(
    input: &Map<String, Value>,
    field: &str,
    range: std::ops::RangeInclusive<u64>,
) -> Result<Option<u32>, ValidationError> {
    match input.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(n) if range.contains(&n) => Ok(Some(n as u32)),
            _ => Err(ValidationError::invalid_option(
                field,
                format!(
                    "must be an integer within [{}, {}]",
                    range.start(),
                    range.end()
                ),
            )),
        },
    }
}

/// 返回第一个存在的字段（新字段名在前，旧字段名在后）
fn first_present<'a>(
    input: &'a Map<String, Value>,
    fields: &[&'static str],
) -> Result<Option<(&'static str, &'a str)>, ValidationError> {
    for &field in fields {
        if let Some(value) = optional_str(input, field)? {
            return Ok(Some((field, value)));
        }
    }
    Ok(None)
}
