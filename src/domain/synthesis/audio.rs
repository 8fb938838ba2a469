//! Synthesis Context - 音频值对象

use serde::{Deserialize, Serialize};

/// 音频输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 16 位 PCM WAV，无损
    #[default]
    Wav,
    /// Opus 格式（OGG 容器），适合语音
    Opus,
    /// MP3 格式
    Mp3,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "opus",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "opus" | "ogg" => Some(AudioFormat::Opus),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 输出规格
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputSpec {
    pub format: AudioFormat,
    /// 目标采样率，None 表示保持模型原生采样率
    pub sample_rate: Option<u32>,
    /// 有损格式的目标比特率（bps）
    pub bitrate: Option<u32>,
}

/// 合成结果
///
/// 原始交织 f32 样本，范围 [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    warnings: Vec<String>,
}

impl SynthesisResult {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 每声道帧数
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
