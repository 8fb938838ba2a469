//! Synthesis Context - 语音合成上下文
//!
//! 推理任务、合成输入、生成参数及合成结果

mod audio;
mod errors;
mod job;
mod value_objects;

pub use audio::{AudioFormat, OutputSpec, SynthesisResult};
pub use errors::ValidationError;
pub use job::{InferenceJob, ReferenceAudio, SynthesisInput};
pub use value_objects::{
    GenerationOptions, JobId, LanguageId, ModelVariant, SynthesisMode, SynthesisText,
    SUPPORTED_LANGUAGES,
};
