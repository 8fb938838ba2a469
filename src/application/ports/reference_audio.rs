//! Reference Audio Port - 参考音频解析与探测

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::synthesis::ReferenceAudio;

/// 参考音频错误
#[derive(Debug, Error)]
pub enum ReferenceAudioError {
    #[error("invalid base64: {0}")]
    InvalidEncoding(String),

    #[error("source not allowed: {0}")]
    NotAllowed(String),

    #[error("failed to fetch: {0}")]
    Fetch(String),

    #[error("audio is empty")]
    Empty,

    #[error("audio is {bytes} bytes (max {max})")]
    TooLarge { bytes: usize, max: usize },

    #[error("unsupported or unreadable audio: {0}")]
    Undecodable(String),

    #[error("audio is {duration:.2}s long (max {max:.2}s)")]
    TooLong { duration: f64, max: f64 },
}

/// Reference Audio Port
#[async_trait]
pub trait ReferenceAudioPort: Send + Sync {
    /// 把引用（base64、data URI、URL、本地路径）解析为原始字节
    async fn resolve(&self, source: &str) -> Result<Vec<u8>, ReferenceAudioError>;

    /// 解码探测：校验编码格式、非空、时长上限
    fn probe(&self, bytes: Vec<u8>, max_secs: f64) -> Result<ReferenceAudio, ReferenceAudioError>;
}
