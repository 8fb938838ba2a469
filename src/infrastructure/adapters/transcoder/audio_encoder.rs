//! Audio Encoder - 原始样本编码
//!
//! 支持：
//! - WAV（16 位 PCM，hound）
//! - Opus（OGG 容器）
//! - 线性插值重采样
//!
//! MP3 可以被请求，但当前构建不包含 MP3 编码器

use ogg::writing::PacketWriter;
use opus::{Application, Channels, Encoder};
use std::io::Cursor;

use crate::application::ports::{AudioEncoderPort, EncodedAudio, EncodingError};
use crate::domain::synthesis::{AudioFormat, OutputSpec, SynthesisResult};

/// 编码器配置
#[derive(Debug, Clone)]
pub struct AudioEncoderConfig {
    /// 未指定时的 Opus 比特率（bps）
    pub default_bitrate: u32,
}

impl Default for AudioEncoderConfig {
    fn default() -> Self {
        Self {
            default_bitrate: 32000,
        }
    }
}

/// PCM 音频编码器
pub struct PcmAudioEncoder {
    config: AudioEncoderConfig,
}

impl PcmAudioEncoder {
    pub fn new(config: AudioEncoderConfig) -> Self {
        Self { config }
    }

    /// 将 f32 样本编码为 16 位 WAV
    fn encode_wav(
        &self,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<Vec<u8>, EncodingError> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut wav = Vec::with_capacity(44 + samples.len() * 2);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut wav), spec)
                .map_err(|e| EncodingError::EncoderFailure(format!("WAV writer: {}", e)))?;
            for &sample in samples {
                writer
                    .write_sample(to_i16(sample))
                    .map_err(|e| EncodingError::EncoderFailure(format!("WAV write: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| EncodingError::EncoderFailure(format!("WAV finalize: {}", e)))?;
        }
        Ok(wav)
    }

    /// 将 f32 样本编码为 Opus (OGG 容器)
    fn encode_opus(
        &self,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
        bitrate: u32,
    ) -> Result<Vec<u8>, EncodingError> {
        let (opus_channels, channel_count) = match channels {
            1 => (Channels::Mono, 1usize),
            2 => (Channels::Stereo, 2usize),
            n => {
                return Err(EncodingError::InvalidInput(format!(
                    "Opus supports mono or stereo, got {} channels",
                    n
                )))
            }
        };

        // Opus 只支持 8/12/16/24/48 kHz，其它采样率先重采样；OpusHead 记录原始采样率
        let encode_rate = opus_compatible_sample_rate(sample_rate);
        let resampled;
        let samples = if encode_rate != sample_rate {
            resampled = resample(samples, sample_rate, encode_rate, channels);
            &resampled[..]
        } else {
            samples
        };

        // Application::Voip 优化语音
        let mut encoder = Encoder::new(encode_rate, opus_channels, Application::Voip)
            .map_err(|e| EncodingError::EncoderFailure(format!("Failed to create Opus encoder: {}", e)))?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(bitrate as i32))
            .map_err(|e| EncodingError::EncoderFailure(format!("Failed to set bitrate: {}", e)))?;

        // 编码器延迟作为 pre-skip
        let pre_skip = encoder.get_lookahead().map(|l| l as u16).unwrap_or(312);

        let pcm_i16: Vec<i16> = samples.iter().map(|&s| to_i16(s)).collect();

        // 20ms 帧
        let frame_size = (encode_rate as usize * 20) / 1000;
        let samples_per_frame = frame_size * channel_count;

        // RFC 7845: granule position 以 48kHz 计
        let granule_scale = 48000 / encode_rate as u64;
        let pre_skip_48k = pre_skip as u64 * granule_scale;
        let total_frames = (pcm_i16.len() / channel_count) as u64;
        let final_granule = pre_skip_48k + total_frames * granule_scale;
        // 编码器缓存的 pre_skip 样本需要额外的静音帧刷出
        let flush_frames = (pre_skip as usize).div_ceil(frame_size).max(1);

        let mut ogg_data = Vec::new();
        {
            let mut packet_writer = PacketWriter::new(&mut ogg_data);
            let serial = 1;

            packet_writer
                .write_packet(
                    opus_head(channel_count as u8, sample_rate, pre_skip_48k as u16),
                    serial,
                    ogg::PacketWriteEndInfo::EndPage,
                    0,
                )
                .map_err(|e| EncodingError::EncoderFailure(format!("Failed to write Opus head: {}", e)))?;
            packet_writer
                .write_packet(opus_tags(), serial, ogg::PacketWriteEndInfo::EndPage, 0)
                .map_err(|e| EncodingError::EncoderFailure(format!("Failed to write Opus tags: {}", e)))?;

            let mut frames: Vec<Vec<i16>> = pcm_i16
                .chunks(samples_per_frame)
                .map(|chunk| {
                    let mut frame = chunk.to_vec();
                    frame.resize(samples_per_frame, 0);
                    frame
                })
                .collect();
            frames.extend(std::iter::repeat(vec![0i16; samples_per_frame]).take(flush_frames));

            // Opus 最大包大小
            let mut output_buf = vec![0u8; 4000];
            let mut granule_pos = pre_skip_48k;
            let last = frames.len() - 1;

            for (idx, frame) in frames.iter().enumerate() {
                let encoded_len = encoder
                    .encode(frame, &mut output_buf)
                    .map_err(|e| EncodingError::EncoderFailure(format!("Opus encode failed: {}", e)))?;

                granule_pos += frame_size as u64 * granule_scale;
                let (end_info, granule) = if idx == last {
                    // 末页的 granule 截掉填充的静音
                    (ogg::PacketWriteEndInfo::EndStream, final_granule)
                } else {
                    (
                        ogg::PacketWriteEndInfo::NormalPacket,
                        granule_pos.min(final_granule),
                    )
                };

                packet_writer
                    .write_packet(output_buf[..encoded_len].to_vec(), serial, end_info, granule)
                    .map_err(|e| EncodingError::EncoderFailure(format!("Failed to write Opus packet: {}", e)))?;
            }
        }

        Ok(ogg_data)
    }
}

impl Default for PcmAudioEncoder {
    fn default() -> Self {
        Self::new(AudioEncoderConfig::default())
    }
}

impl AudioEncoderPort for PcmAudioEncoder {
    fn encode(
        &self,
        result: &SynthesisResult,
        spec: &OutputSpec,
    ) -> Result<EncodedAudio, EncodingError> {
        if result.is_empty() || result.channels() == 0 || result.sample_rate() == 0 {
            return Err(EncodingError::InvalidInput(
                "synthesis produced no audio".to_string(),
            ));
        }

        let channels = result.channels();
        let native_rate = result.sample_rate();
        let target_rate = spec.sample_rate.unwrap_or(native_rate);

        let resampled;
        let samples = if target_rate != native_rate {
            resampled = resample(result.samples(), native_rate, target_rate, channels);
            &resampled[..]
        } else {
            result.samples()
        };
        let frames = samples.len() / channels as usize;
        let duration_secs = frames as f64 / target_rate as f64;

        let data = match spec.format {
            AudioFormat::Wav => self.encode_wav(samples, target_rate, channels)?,
            AudioFormat::Opus => {
                let bitrate = spec.bitrate.unwrap_or(self.config.default_bitrate);
                self.encode_opus(samples, target_rate, channels, bitrate)?
            }
            AudioFormat::Mp3 => {
                return Err(EncodingError::UnsupportedFormat(
                    "mp3 encoding is not available in this build, use wav or opus".to_string(),
                ))
            }
        };

        tracing::debug!(
            format = %spec.format,
            native_rate,
            sample_rate = target_rate,
            bytes = data.len(),
            "Audio encoded"
        );

        Ok(EncodedAudio {
            data,
            format: spec.format,
            sample_rate: target_rate,
            channels,
            duration_secs,
        })
    }

    fn supports_format(&self, format: AudioFormat) -> bool {
        match format {
            AudioFormat::Wav | AudioFormat::Opus => true,
            AudioFormat::Mp3 => false,
        }
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// 获取 Opus 兼容的采样率
fn opus_compatible_sample_rate(sample_rate: u32) -> u32 {
    match sample_rate {
        8000 | 12000 | 16000 | 24000 | 48000 => sample_rate,
        r if r <= 8000 => 8000,
        r if r <= 12000 => 12000,
        r if r <= 16000 => 16000,
        r if r <= 24000 => 24000,
        _ => 48000,
    }
}

/// 简单线性重采样
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32, channels: u16) -> Vec<f32> {
    let channel_count = channels.max(1) as usize;
    let frame_count = samples.len() / channel_count;
    if from_rate == to_rate || frame_count == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_frame_count = (frame_count as f64 * ratio).round() as usize;
    let mut resampled = Vec::with_capacity(new_frame_count * channel_count);

    for i in 0..new_frame_count {
        let src_pos = i as f64 / ratio;
        let src_idx = (src_pos as usize).min(frame_count - 1);
        let frac = (src_pos - src_idx as f64) as f32;
        let next_idx = (src_idx + 1).min(frame_count - 1);

        for ch in 0..channel_count {
            let s0 = samples[src_idx * channel_count + ch];
            let s1 = samples[next_idx * channel_count + ch];
            resampled.push(s0 + (s1 - s0) * frac);
        }
    }

    resampled
}

/// 创建 Opus Head 包 (RFC 7845)
fn opus_head(channels: u8, input_sample_rate: u32, pre_skip: u16) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&input_sample_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // channel mapping family
    head
}

/// 创建 Opus Tags 包
fn opus_tags() -> Vec<u8> {
    let vendor = concat!("runvoice ", env!("CARGO_PKG_VERSION"));
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::transcoder::decode_to_pcm;

    /// 1 秒 440Hz 正弦波
    fn tone(sample_rate: u32) -> SynthesisResult {
        let samples = (0..sample_rate)
            .map(|i| 0.5 * (std::f32::consts::TAU * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        SynthesisResult::new(samples, sample_rate, 1)
    }

    fn spec(format: AudioFormat, sample_rate: Option<u32>) -> OutputSpec {
        OutputSpec {
            format,
            sample_rate,
            bitrate: None,
        }
    }

    #[test]
    fn test_wav_round_trip() {
        let encoder = PcmAudioEncoder::default();
        let source = tone(24000);
        let encoded = encoder.encode(&source, &spec(AudioFormat::Wav, None)).unwrap();

        assert_eq!(encoded.format, AudioFormat::Wav);
        assert_eq!(encoded.sample_rate, 24000);
        assert_eq!(&encoded.data[0..4], b"RIFF");
        assert!((encoded.duration_secs - 1.0).abs() < 1e-6);

        let decoded = decode_to_pcm(encoded.data, None).unwrap();
        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), source.samples().len());
        let tolerance = 2.0 / 32767.0;
        for (a, b) in source.samples().iter().zip(&decoded.samples) {
            assert!((a - b).abs() <= tolerance, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_opus_is_ogg_and_smaller() {
        let encoder = PcmAudioEncoder::default();
        let source = tone(24000);

        let wav = encoder.encode(&source, &spec(AudioFormat::Wav, None)).unwrap();
        let opus = encoder.encode(&source, &spec(AudioFormat::Opus, None)).unwrap();

        assert_eq!(opus.format, AudioFormat::Opus);
        assert_eq!(&opus.data[0..4], b"OggS");
        assert!(opus.data.len() < wav.data.len());
        assert!(opus.data.windows(8).any(|w| w == b"OpusHead"));
    }

    #[test]
    fn test_opus_at_non_native_rate() {
        let encoder = PcmAudioEncoder::default();
        let opus = encoder
            .encode(&tone(22050), &spec(AudioFormat::Opus, None))
            .unwrap();
        assert_eq!(opus.sample_rate, 22050);
        assert_eq!(&opus.data[0..4], b"OggS");
    }

    /// 读取 OpusHead 中的 pre-skip
    fn opus_pre_skip(ogg: &[u8]) -> u16 {
        let at = ogg
            .windows(8)
            .position(|w| w == b"OpusHead")
            .expect("OpusHead packet");
        u16::from_le_bytes([ogg[at + 10], ogg[at + 11]])
    }

    #[test]
    fn test_opus_pre_skip_is_in_48khz_units() {
        let encoder = PcmAudioEncoder::default();
        let low = encoder
            .encode(&tone(16000), &spec(AudioFormat::Opus, None))
            .unwrap();
        let full = encoder
            .encode(&tone(48000), &spec(AudioFormat::Opus, None))
            .unwrap();

        // 编码器延迟是固定时长，按 48kHz 计时与输入采样率无关
        let pre_skip = opus_pre_skip(&full.data);
        assert!(pre_skip > 0);
        assert_eq!(opus_pre_skip(&low.data), pre_skip);
    }

    #[test]
    fn test_resample_on_request() {
        let encoder = PcmAudioEncoder::default();
        let encoded = encoder
            .encode(&tone(24000), &spec(AudioFormat::Wav, Some(16000)))
            .unwrap();

        assert_eq!(encoded.sample_rate, 16000);
        let decoded = decode_to_pcm(encoded.data, None).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.frames(), 16000);
    }

    #[test]
    fn test_resample_stereo_keeps_channels_interleaved() {
        let samples = vec![0.0, 1.0, 0.5, 1.0, 1.0, 1.0];
        let out = resample(&samples, 3, 6, 2);
        assert_eq!(out.len(), 12);
        assert!(out.chunks(2).all(|frame| frame[1] == 1.0));
    }

    #[test]
    fn test_mp3_is_unsupported() {
        let encoder = PcmAudioEncoder::default();
        assert!(!encoder.supports_format(AudioFormat::Mp3));
        assert!(matches!(
            encoder.encode(&tone(16000), &spec(AudioFormat::Mp3, None)),
            Err(EncodingError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_result_is_rejected() {
        let encoder = PcmAudioEncoder::default();
        let empty = SynthesisResult::new(vec![], 24000, 1);
        assert!(matches!(
            encoder.encode(&empty, &spec(AudioFormat::Wav, None)),
            Err(EncodingError::InvalidInput(_))
        ));
    }
}
