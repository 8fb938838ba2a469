//! Audio Encoder Port - 音频编码抽象
//!
//! 把原始样本编码成容器/编码格式的字节流；传输层编码（base64）不在这里做

use thiserror::Error;

use crate::domain::synthesis::{AudioFormat, OutputSpec, SynthesisResult};

/// 编码错误
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoder failure: {0}")]
    EncoderFailure(String),
}

/// 编码结果
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    /// 编码后的音频数据
    pub data: Vec<u8>,
    pub format: AudioFormat,
    /// 输出采样率（重采样后）
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
}

/// Audio Encoder Port
pub trait AudioEncoderPort: Send + Sync {
    /// 编码音频
    ///
    /// 请求的采样率与结果采样率不同时先重采样
    fn encode(
        &self,
        result: &SynthesisResult,
        spec: &OutputSpec,
    ) -> Result<EncodedAudio, EncodingError>;

    /// 检查是否支持指定格式
    fn supports_format(&self, format: AudioFormat) -> bool;
}
