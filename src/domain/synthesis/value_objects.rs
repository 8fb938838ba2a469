//! Synthesis Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;
use crate::domain::text_normalizer::normalize_text;

/// 任务唯一标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// 使用托管运行时分配的 ID，缺失或为空时生成新 ID
    pub fn from_external(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some(id) if !id.is_empty() => Self(id.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 模型变体
///
/// 每个变体在进程内最多加载一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// 英文 TTS 模型（默认）
    English,
    /// 多语言 TTS 模型
    Multilingual,
    /// 声音转换模型
    VoiceClone,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [
        ModelVariant::English,
        ModelVariant::Multilingual,
        ModelVariant::VoiceClone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::English => "english",
            ModelVariant::Multilingual => "multilingual",
            ModelVariant::VoiceClone => "voice_clone",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "english" => Some(ModelVariant::English),
            "multilingual" => Some(ModelVariant::Multilingual),
            "voice_clone" => Some(ModelVariant::VoiceClone),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// 文本转语音（可选参考音色）
    #[default]
    Tts,
    /// 声音到声音的转换（无文本）
    VoiceClone,
}

impl SynthesisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisMode::Tts => "tts",
            SynthesisMode::VoiceClone => "voice_clone",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "tts" => Some(SynthesisMode::Tts),
            "voice_clone" => Some(SynthesisMode::VoiceClone),
            _ => None,
        }
    }
}

/// 多语言模型支持的语言
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "ar", "da", "de", "el", "en", "es", "fi", "fr", "he", "hi", "it", "ja", "ko", "ms", "nl",
    "no", "pl", "pt", "ru", "sv", "sw", "tr", "zh",
];

/// 语言 ID（ISO 639-1，小写）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageId(String);

impl LanguageId {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim().to_ascii_lowercase();
        if !SUPPORTED_LANGUAGES.contains(&code.as_str()) {
            return Err(ValidationError::invalid_option(
                "language_id",
                format!("unsupported language `{}`", code),
            ));
        }
        Ok(Self(code))
    }

    pub fn is_english(&self) -> bool {
        self.0 == "en"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 合成文本
///
/// 不变量:
/// - 已经过规范化
/// - 非空，且字符数（Unicode 标量）不超过构造时给定的上限
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisText(String);

impl SynthesisText {
    pub fn new(raw: &str, max_chars: usize) -> Result<Self, ValidationError> {
        let normalized = normalize_text(raw);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let length = normalized.chars().count();
        if length > max_chars {
            return Err(ValidationError::TextTooLong {
                length,
                max: max_chars,
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

/// 生成参数
///
/// 默认值与上游模型推荐值一致
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    /// 采样温度 (0.05 - 5.0)
    pub temperature: f32,
    /// nucleus 采样阈值 (0.0, 1.0]
    pub top_p: f32,
    /// min-p 采样阈值 [0.0, 1.0]
    pub min_p: f32,
    /// 重复惩罚 [1.0, 2.0]
    pub repetition_penalty: f32,
    /// 情绪夸张度 [0.25, 2.0]
    pub exaggeration: f32,
    /// classifier-free guidance 权重 [0.0, 1.0]
    pub cfg_weight: f32,
    /// 语速 [0.5, 2.0]
    pub speed: f32,
    /// 随机种子，设置后结果确定
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 1.0,
            min_p: 0.05,
            repetition_penalty: 1.2,
            exaggeration: 0.5,
            cfg_weight: 0.5,
            speed: 1.0,
            seed: None,
        }
    }
}

/// 参数名 -> 取值范围（闭区间，top_p 下界为开区间单独处理）
const OPTION_RANGES: &[(&str, f32, f32)] = &[
    ("temperature", 0.05, 5.0),
    ("top_p", 0.0, 1.0),
    ("min_p", 0.0, 1.0),
    ("repetition_penalty", 1.0, 2.0),
    ("exaggeration", 0.25, 2.0),
    ("cfg_weight", 0.0, 1.0),
    ("speed", 0.5, 2.0),
];

impl GenerationOptions {
    /// 支持的浮点参数名
    pub fn float_option_names() -> impl Iterator<Item = &'static str> {
        OPTION_RANGES.iter().map(|(name, _, _)| *name)
    }

    /// 设置浮点参数，越界或未知参数返回 InvalidOption
    pub fn set_float(&mut self, name: &str, value: f64) -> Result<(), ValidationError> {
        let (_, min, max) = OPTION_RANGES
            .iter()
            .find(|(n, _, _)| *n == name)
            .ok_or_else(|| ValidationError::invalid_option(name, "unknown option"))?;

        let value = value as f32;
        let out_of_range = !(*min..=*max).contains(&value) || (name == "top_p" && value <= 0.0);
        if !value.is_finite() || out_of_range {
            return Err(ValidationError::invalid_option(
                name,
                format!("must be within [{}, {}], got {}", min, max, value),
            ));
        }

        let slot = match name {
            "temperature" => &mut self.temperature,
            "top_p" => &mut self.top_p,
            "min_p" => &mut self.min_p,
            "repetition_penalty" => &mut self.repetition_penalty,
            "exaggeration" => &mut self.exaggeration,
            "cfg_weight" => &mut self.cfg_weight,
            _ => &mut self.speed,
        };
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_from_external() {
        assert_eq!(JobId::from_external(Some("job-1")).as_str(), "job-1");
        assert!(!JobId::from_external(Some("  ")).as_str().is_empty());
        assert!(!JobId::from_external(None).as_str().is_empty());
    }

    #[test]
    fn test_text_length_boundary() {
        let max = 16;
        assert!(SynthesisText::new(&"a".repeat(max), max).is_ok());
        assert_eq!(
            SynthesisText::new(&"a".repeat(max + 1), max),
            Err(ValidationError::TextTooLong {
                length: max + 1,
                max
            })
        );
    }

    #[test]
    fn test_text_length_counted_after_normalization() {
        // 折叠后的空白不计入长度
        let text = SynthesisText::new("ab    cd", 5).unwrap();
        assert_eq!(text.as_str(), "ab cd");
        assert_eq!(text.char_count(), 5);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(SynthesisText::new("", 10), Err(ValidationError::EmptyText));
        assert_eq!(SynthesisText::new(" \n ", 10), Err(ValidationError::EmptyText));
    }

    #[test]
    fn test_language_id() {
        assert!(LanguageId::new("FR").unwrap().as_str() == "fr");
        assert!(LanguageId::new("en").unwrap().is_english());
        assert!(matches!(
            LanguageId::new("xx"),
            Err(ValidationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_set_float_ranges() {
        let mut options = GenerationOptions::default();
        assert!(options.set_float("temperature", 1.1).is_ok());
        assert!((options.temperature - 1.1).abs() < 1e-6);
        assert!(options.set_float("temperature", 9.0).is_err());
        assert!(options.set_float("top_p", 0.0).is_err());
        assert!(options.set_float("top_p", 1.0).is_ok());
        assert!(options.set_float("volume", 1.0).is_err());
    }

    #[test]
    fn test_variant_round_trip() {
        for variant in ModelVariant::ALL {
            assert_eq!(ModelVariant::from_str(variant.as_str()), Some(variant));
        }
    }
}
