//! Domain Layer - 领域层
//!
//! Synthesis Context: 推理任务、合成输入与结果

pub mod synthesis;

mod text_normalizer;

pub use text_normalizer::normalize_text;
