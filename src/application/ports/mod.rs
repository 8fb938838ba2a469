//! 六边形架构端口定义
//!
//! 应用层只依赖这些 trait，具体实现位于 infrastructure 层

mod audio_encoder;
mod job_tracker;
mod model_provider;
mod reference_audio;
mod synthesis_executor;
mod synthesis_model;

pub use audio_encoder::{AudioEncoderPort, EncodedAudio, EncodingError};
pub use job_tracker::{JobCounts, JobRecord, JobState, JobTrackerPort, TrackerError};
pub use model_provider::{ModelProviderPort, ModelStatus};
pub use reference_audio::{ReferenceAudioError, ReferenceAudioPort};
pub use synthesis_executor::{ExecutionError, ExecutorStats, SynthesisExecutorPort};
pub use synthesis_model::{
    DeviceError, LoadError, ModelHandle, ModelSourcePort, SynthesisModel, SynthesisRequest,
};
