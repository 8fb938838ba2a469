//! PCM Decoder - 基于 symphonia 的音频解码
//!
//! 支持 WAV / MP3 / FLAC / OGG Vorbis，解码为交织 f32 样本

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// 解码结果
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// 交织 f32 样本
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// 编码格式短名（例如 pcm_s16le、mp3）
    pub codec: String,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// 解码音频字节
///
/// `max_secs` 用于提前终止超长音频的解码
pub fn decode_to_pcm<T>(data: T, max_secs: Option<f64>) -> Result<DecodedAudio, String>
where
    T: AsRef<[u8]> + Send + Sync + 'static,
{
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("probe failed: {}", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "unknown sample rate".to_string())?;

    let codec = symphonia::default::get_codecs()
        .get_codec(track.codec_params.codec)
        .map(|d| d.short_name.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {}", e))?;

    let track_id = track.id;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut samples: Vec<f32> = Vec::new();
    let max_samples = max_secs.map(|secs| {
        // 多解一点，让调用方能判断出超长
        ((secs + 1.0) * sample_rate as f64) as usize * channels.unwrap_or(1) as usize
    });

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(format!("packet read error: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => return Err(format!("decode failed: {}", e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        channels.get_or_insert(spec.channels.count() as u16);
        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let actual_samples = num_frames * spec.channels.count();
        samples.extend(&sample_buf.samples()[..actual_samples]);

        if max_samples.is_some_and(|max| samples.len() > max) {
            break;
        }
    }

    let channels = channels.ok_or_else(|| "unknown channel count".to_string())?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        codec,
    })
}
