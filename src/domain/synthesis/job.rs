//! Synthesis Context - 推理任务

use std::sync::Arc;
use std::time::Duration;

use super::{
    GenerationOptions, JobId, LanguageId, ModelVariant, OutputSpec, SynthesisMode, SynthesisText,
};

/// 已解码校验的参考音频
///
/// 不变量:
/// - 字节可被解码，时长大于 0 且不超过配置上限
#[derive(Clone)]
pub struct ReferenceAudio {
    bytes: Arc<[u8]>,
    codec: String,
    sample_rate: u32,
    channels: u16,
    duration_secs: f64,
}

impl ReferenceAudio {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        codec: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        duration_secs: f64,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            codec: codec.into(),
            sample_rate,
            channels,
            duration_secs,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

impl std::fmt::Debug for ReferenceAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceAudio")
            .field("bytes", &self.bytes.len())
            .field("codec", &self.codec)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs)
            .finish()
    }
}

/// 合成输入
#[derive(Debug, Clone)]
pub enum SynthesisInput {
    /// 文本转语音
    Speech {
        text: SynthesisText,
        language: Option<LanguageId>,
        voice_reference: Option<ReferenceAudio>,
    },
    /// 声音转换：把 source 的内容用 target 的音色重新说一遍
    VoiceConversion {
        source: ReferenceAudio,
        target: ReferenceAudio,
    },
}

impl SynthesisInput {
    pub fn mode(&self) -> SynthesisMode {
        match self {
            SynthesisInput::Speech { .. } => SynthesisMode::Tts,
            SynthesisInput::VoiceConversion { .. } => SynthesisMode::VoiceClone,
        }
    }

    /// 处理该输入所需的模型变体
    ///
    /// 未指定语言或语言为 en 时走英文模型
    pub fn variant(&self) -> ModelVariant {
        match self {
            SynthesisInput::Speech { language, .. } => match language {
                Some(lang) if !lang.is_english() => ModelVariant::Multilingual,
                _ => ModelVariant::English,
            },
            SynthesisInput::VoiceConversion { .. } => ModelVariant::VoiceClone,
        }
    }

    pub fn language(&self) -> Option<&LanguageId> {
        match self {
            SynthesisInput::Speech { language, .. } => language.as_ref(),
            SynthesisInput::VoiceConversion { .. } => None,
        }
    }

    pub fn is_voice_cloned(&self) -> bool {
        match self {
            SynthesisInput::Speech {
                voice_reference, ..
            } => voice_reference.is_some(),
            SynthesisInput::VoiceConversion { .. } => true,
        }
    }
}

/// 推理任务
///
/// 请求校验通过后创建，响应返回后销毁；创建后不可变
#[derive(Debug, Clone)]
pub struct InferenceJob {
    id: JobId,
    input: SynthesisInput,
    options: GenerationOptions,
    output: OutputSpec,
    /// 进入 GPU 准入队列后最多等待的时长
    queue_window: Duration,
}

impl InferenceJob {
    pub fn new(
        id: JobId,
        input: SynthesisInput,
        options: GenerationOptions,
        output: OutputSpec,
        queue_window: Duration,
    ) -> Self {
        Self {
            id,
            input,
            options,
            output,
            queue_window,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn input(&self) -> &SynthesisInput {
        &self.input
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    pub fn queue_window(&self) -> Duration {
        self.queue_window
    }

    pub fn variant(&self) -> ModelVariant {
        self.input.variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceAudio {
        ReferenceAudio::new(vec![0u8; 4], "pcm_s16le", 16000, 1, 1.0)
    }

    #[test]
    fn test_variant_selection() {
        let text = SynthesisText::new("Bonjour", 100).unwrap();
        let english = SynthesisInput::Speech {
            text: text.clone(),
            language: None,
            voice_reference: None,
        };
        assert_eq!(english.variant(), ModelVariant::English);

        let en = SynthesisInput::Speech {
            text: text.clone(),
            language: Some(LanguageId::new("en").unwrap()),
            voice_reference: None,
        };
        assert_eq!(en.variant(), ModelVariant::English);

        let french = SynthesisInput::Speech {
            text,
            language: Some(LanguageId::new("fr").unwrap()),
            voice_reference: Some(reference()),
        };
        assert_eq!(french.variant(), ModelVariant::Multilingual);
        assert!(french.is_voice_cloned());

        let clone = SynthesisInput::VoiceConversion {
            source: reference(),
            target: reference(),
        };
        assert_eq!(clone.variant(), ModelVariant::VoiceClone);
        assert_eq!(clone.mode(), SynthesisMode::VoiceClone);
    }

    #[test]
    fn test_reference_debug_hides_bytes() {
        let debug = format!("{:?}", reference());
        assert!(debug.contains("bytes: 4"));
    }
}
