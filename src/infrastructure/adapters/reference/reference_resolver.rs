//! Reference Resolver - 参考音频解析
//!
//! 实现 ReferenceAudioPort trait。支持的引用形式：
//! - 裸 base64
//! - `data:audio/wav;base64,...`
//! - `http://` / `https://` URL（需开启 allow_remote）
//! - `file://` 本地路径（需开启 allow_local_paths）

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{ReferenceAudioError, ReferenceAudioPort};
use crate::domain::synthesis::ReferenceAudio;
use crate::infrastructure::adapters::transcoder::decode_to_pcm;

/// 参考音频解析配置
#[derive(Debug, Clone)]
pub struct ReferenceResolverConfig {
    /// 单个参考音频的字节上限
    pub max_bytes: usize,
    /// 远程下载超时
    pub fetch_timeout: Duration,
    pub allow_remote: bool,
    pub allow_local_paths: bool,
}

impl Default for ReferenceResolverConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(30),
            allow_remote: false,
            allow_local_paths: false,
        }
    }
}

/// 基于 symphonia 探测的参考音频解析器
pub struct SymphoniaReferenceResolver {
    client: Client,
    config: ReferenceResolverConfig,
}

impl SymphoniaReferenceResolver {
    pub fn new(config: ReferenceResolverConfig) -> Result<Self, ReferenceAudioError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| ReferenceAudioError::Fetch(format!("failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn check_size(&self, bytes: usize) -> Result<(), ReferenceAudioError> {
        if bytes == 0 {
            return Err(ReferenceAudioError::Empty);
        }
        if bytes > self.config.max_bytes {
            return Err(ReferenceAudioError::TooLarge {
                bytes,
                max: self.config.max_bytes,
            });
        }
        Ok(())
    }

    fn decode_base64(&self, encoded: &str) -> Result<Vec<u8>, ReferenceAudioError> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ReferenceAudioError::Empty);
        }
        // base64 长度约为原始字节的 4/3，超限时不必解码
        if compact.len() / 4 * 3 > self.config.max_bytes + 3 {
            return Err(ReferenceAudioError::TooLarge {
                bytes: compact.len() / 4 * 3,
                max: self.config.max_bytes,
            });
        }

        STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(&compact))
            .map_err(|e| ReferenceAudioError::InvalidEncoding(e.to_string()))
    }

    fn decode_data_uri(&self, uri: &str) -> Result<Vec<u8>, ReferenceAudioError> {
        let (header, payload) = uri
            .split_once(',')
            .ok_or_else(|| ReferenceAudioError::InvalidEncoding("data URI has no payload".into()))?;
        if !header.ends_with(";base64") {
            return Err(ReferenceAudioError::InvalidEncoding(
                "data URI must be base64 encoded".into(),
            ));
        }
        self.decode_base64(payload)
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, ReferenceAudioError> {
        if !self.config.allow_remote {
            return Err(ReferenceAudioError::NotAllowed(
                "remote references are disabled".into(),
            ));
        }

        tracing::debug!(url = %url, "Fetching reference audio");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReferenceAudioError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReferenceAudioError::Fetch(format!("HTTP {}", status)));
        }
        if let Some(length) = response.content_length() {
            self.check_size(length as usize)?;
        }

        // 分块响应没有 Content-Length，边读边检查上限
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ReferenceAudioError::Fetch(e.to_string()))?
        {
            let received = bytes.len() + chunk.len();
            if received > self.config.max_bytes {
                tracing::warn!(url = %url, received, max = self.config.max_bytes, "Reference download aborted");
                return Err(ReferenceAudioError::TooLarge {
                    bytes: received,
                    max: self.config.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>, ReferenceAudioError> {
        if !self.config.allow_local_paths {
            return Err(ReferenceAudioError::NotAllowed(
                "local file references are disabled".into(),
            ));
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ReferenceAudioError::Fetch(format!("{}: {}", path, e)))?;
        self.check_size(metadata.len() as usize)?;

        tokio::fs::read(path)
            .await
            .map_err(|e| ReferenceAudioError::Fetch(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl ReferenceAudioPort for SymphoniaReferenceResolver {
    async fn resolve(&self, source: &str) -> Result<Vec<u8>, ReferenceAudioError> {
        let source = source.trim();

        let bytes = if source.starts_with("data:") {
            self.decode_data_uri(source)?
        } else if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_remote(source).await?
        } else if let Some(path) = source.strip_prefix("file://") {
            self.read_local(path).await?
        } else {
            self.decode_base64(source)?
        };

        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    fn probe(&self, bytes: Vec<u8>, max_secs: f64) -> Result<ReferenceAudio, ReferenceAudioError> {
        self.check_size(bytes.len())?;

        let bytes: Arc<[u8]> = bytes.into();
        let decoded = decode_to_pcm(bytes.clone(), Some(max_secs))
            .map_err(ReferenceAudioError::Undecodable)?;

        if decoded.frames() == 0 {
            return Err(ReferenceAudioError::Empty);
        }
        let duration = decoded.duration_secs();
        if duration > max_secs {
            return Err(ReferenceAudioError::TooLong {
                duration,
                max: max_secs,
            });
        }

        tracing::debug!(
            codec = %decoded.codec,
            sample_rate = decoded.sample_rate,
            channels = decoded.channels,
            duration_secs = duration,
            "Reference audio probed"
        );

        Ok(ReferenceAudio::new(
            bytes,
            decoded.codec,
            decoded.sample_rate,
            decoded.channels,
            duration,
        ))
    }
}
