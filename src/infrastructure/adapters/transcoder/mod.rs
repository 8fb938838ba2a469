//! Transcoder - 音频编解码

mod audio_encoder;
mod pcm_decoder;

pub use audio_encoder::{resample, AudioEncoderConfig, PcmAudioEncoder};
pub use pcm_decoder::{decode_to_pcm, DecodedAudio};
