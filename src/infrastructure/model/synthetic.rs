//! Synthetic Model - CPU 信号发生器
//!
//! 不依赖 GPU 的确定性后端，用于本地开发、冒烟测试和单元测试。
//! 按词生成带包络的谐波音，时长随文本长度和语速变化

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    DeviceError, LoadError, ModelSourcePort, SynthesisModel, SynthesisRequest,
};
use crate::domain::synthesis::{
    GenerationOptions, ModelVariant, ReferenceAudio, SynthesisInput, SynthesisResult,
};

/// 每个字符对应的语音时长（秒）
const SECS_PER_CHAR: f32 = 0.06;
/// 词间停顿（秒）
const WORD_GAP_SECS: f32 = 0.08;
/// 首尾静音（秒）
const EDGE_SILENCE_SECS: f32 = 0.15;

/// Synthetic 后端配置
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub sample_rate: u32,
    /// 模拟的逐字符计算延迟
    pub latency_per_char: Duration,
    /// 模拟的加载耗时
    pub load_delay: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            latency_per_char: Duration::ZERO,
            load_delay: Duration::ZERO,
        }
    }
}

/// Synthetic 模型来源
pub struct SyntheticModelSource {
    config: SyntheticConfig,
}

impl SyntheticModelSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelSourcePort for SyntheticModelSource {
    async fn load(&self, variant: ModelVariant) -> Result<Arc<dyn SynthesisModel>, LoadError> {
        if !self.config.load_delay.is_zero() {
            tokio::time::sleep(self.config.load_delay).await;
        }
        Ok(Arc::new(SyntheticModel {
            variant,
            config: self.config.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("synthetic ({} Hz)", self.config.sample_rate)
    }
}

/// Synthetic 模型
pub struct SyntheticModel {
    variant: ModelVariant,
    config: SyntheticConfig,
}

#[async_trait]
impl SynthesisModel for SyntheticModel {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    async fn synthesize(
        &self,
        request: SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<SynthesisResult, DeviceError> {
        let units = match &request.input {
            SynthesisInput::Speech { text, .. } => text.char_count(),
            SynthesisInput::VoiceConversion { source, .. } => {
                (source.duration_secs() / SECS_PER_CHAR as f64).ceil() as usize
            }
        };

        let latency = self.config.latency_per_char * units as u32;
        if !latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DeviceError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        let seed = request.options.seed.unwrap_or_else(rand::random);
        let samples = render(&request.input, &request.options, self.config.sample_rate, seed);
        tracing::debug!(
            job_id = %request.job_id,
            seed,
            frames = samples.len(),
            "Synthetic audio rendered"
        );

        Ok(SynthesisResult::new(samples, self.config.sample_rate, 1))
    }
}

/// 一个发声片段（词）
struct Segment {
    start: usize,
    len: usize,
    /// 音高偏移（半音）
    inflection: f32,
}

fn render(
    input: &SynthesisInput,
    options: &GenerationOptions,
    sample_rate: u32,
    seed: u64,
) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sr = sample_rate as f32;
    let speed = options.speed.max(0.1);
    let edge = (EDGE_SILENCE_SECS * sr) as usize;

    let (word_lengths, voice): (Vec<usize>, Option<&ReferenceAudio>) = match input {
        SynthesisInput::Speech {
            text,
            voice_reference,
            ..
        } => (
            text.as_str()
                .split_whitespace()
                .map(|w| w.chars().count())
                .collect(),
            voice_reference.as_ref(),
        ),
        SynthesisInput::VoiceConversion { source, target } => {
            // 源音频的时长决定输出时长，每 0.5s 一个片段
            let pieces = ((source.duration_secs() / 0.5).ceil() as usize).max(1);
            let chars_per_piece = (0.5 / SECS_PER_CHAR).round() as usize;
            (vec![chars_per_piece; pieces], Some(target))
        }
    };

    let mut segments = Vec::with_capacity(word_lengths.len());
    let mut cursor = edge;
    for chars in word_lengths {
        let len = ((chars.max(1) as f32 * SECS_PER_CHAR / speed) * sr) as usize;
        segments.push(Segment {
            start: cursor,
            len,
            inflection: rng.random_range(-2.0f32..2.0) * options.temperature.min(2.0),
        });
        cursor += len + ((WORD_GAP_SECS / speed) * sr) as usize;
    }
    let total = cursor + edge;

    let base_pitch = base_pitch(voice) * 2f32.powf((options.exaggeration - 0.5) * 0.5);
    let amplitude = (0.25 + 0.15 * options.exaggeration).min(0.6);
    let noise_level = 0.01 * options.temperature.min(2.0);

    let mut samples = vec![0.0f32; total];
    for segment in &segments {
        let pitch = base_pitch * 2f32.powf(segment.inflection / 12.0);
        let mut phase = 0.0f32;
        for i in 0..segment.len {
            let t = i as f32 / segment.len as f32;
            // 音高在词内缓慢下滑
            let f = pitch * (1.0 - 0.08 * t);
            phase = (phase + TAU * f / sr) % TAU;
            let voiced = 0.6 * phase.sin() + 0.25 * (2.0 * phase).sin() + 0.1 * (3.0 * phase).sin();
            let noise = rng.random_range(-1.0f32..1.0) * noise_level;
            samples[segment.start + i] = amplitude * envelope(t) * voiced + noise;
        }
    }

    for sample in samples.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }
    samples
}

/// 起音/释音包络
fn envelope(t: f32) -> f32 {
    const ATTACK: f32 = 0.1;
    const RELEASE: f32 = 0.2;
    if t < ATTACK {
        t / ATTACK
    } else if t > 1.0 - RELEASE {
        (1.0 - t) / RELEASE
    } else {
        1.0
    }
}

/// 参考音色决定基频；无参考时使用默认音色
fn base_pitch(voice: Option<&ReferenceAudio>) -> f32 {
    match voice {
        None => 140.0,
        Some(reference) => {
            // FNV-1a
            let hash = reference
                .bytes()
                .iter()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ *b as u64).wrapping_mul(0x100000001b3)
                });
            90.0 + (hash % 140) as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesis::SynthesisText;

    fn speech(text: &str) -> SynthesisInput {
        SynthesisInput::Speech {
            text: SynthesisText::new(text, 1000).unwrap(),
            language: None,
            voice_reference: None,
        }
    }

    fn request(input: SynthesisInput, seed: Option<u64>) -> SynthesisRequest {
        SynthesisRequest {
            job_id: "test".to_string(),
            input,
            options: GenerationOptions {
                seed,
                ..Default::default()
            },
        }
    }

    async fn model() -> Arc<dyn SynthesisModel> {
        SyntheticModelSource::new(SyntheticConfig::default())
            .load(ModelVariant::English)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hello_world() {
        let model = model().await;
        let result = model
            .synthesize(request(speech("Hello world"), Some(1)), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.sample_rate(), 24000);
        assert_eq!(result.channels(), 1);
        assert!(result.duration_secs() > 0.5);
        assert!(result.samples().iter().any(|s| s.abs() > 0.05));
        assert!(result.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[tokio::test]
    async fn test_seed_is_deterministic() {
        let model = model().await;
        let run = |seed| {
            let model = model.clone();
            async move {
                model
                    .synthesize(request(speech("same text"), Some(seed)), CancellationToken::new())
                    .await
                    .unwrap()
            }
        };

        assert_eq!(run(42).await, run(42).await);
        assert_ne!(run(42).await.samples(), run(43).await.samples());
    }

    #[tokio::test]
    async fn test_longer_text_and_speed() {
        let model = model().await;
        let short = model
            .synthesize(request(speech("hi"), Some(1)), CancellationToken::new())
            .await
            .unwrap();
        let long = model
            .synthesize(
                request(speech("a considerably longer sentence"), Some(1)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(long.duration_secs() > short.duration_secs());

        let mut fast = request(speech("a considerably longer sentence"), Some(1));
        fast.options.speed = 2.0;
        let fast = model.synthesize(fast, CancellationToken::new()).await.unwrap();
        assert!(fast.duration_secs() < long.duration_secs());
    }

    #[tokio::test]
    async fn test_voice_conversion_follows_source_length() {
        let model = model().await;
        let source = ReferenceAudio::new(vec![1u8; 8], "pcm_s16le", 16000, 1, 3.0);
        let target = ReferenceAudio::new(vec![2u8; 8], "pcm_s16le", 16000, 1, 2.0);
        let result = model
            .synthesize(
                request(SynthesisInput::VoiceConversion { source, target }, Some(3)),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.duration_secs() >= 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_early() {
        let model = SyntheticModelSource::new(SyntheticConfig {
            latency_per_char: Duration::from_secs(1),
            ..Default::default()
        })
        .load(ModelVariant::English)
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = model
            .synthesize(request(speech("slow"), None), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Cancelled));
    }
}
