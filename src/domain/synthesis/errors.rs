//! Synthesis Context - Errors

use thiserror::Error;

/// 请求校验错误
///
/// 全部属于调用方输入错误：不自动重试，原样返回给调用方
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Text is empty")]
    EmptyText,

    #[error("Text is too long: {length} characters (max {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("Invalid option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("Bad reference audio in `{field}`: {reason}")]
    BadReferenceAudio { field: String, reason: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl ValidationError {
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_reference(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadReferenceAudio {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    /// 响应中的 error.kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyText => "EmptyText",
            Self::TextTooLong { .. } => "TextTooLong",
            Self::InvalidOption { .. } => "InvalidOption",
            Self::BadReferenceAudio { .. } => "BadReferenceAudio",
            Self::MalformedPayload(_) => "MalformedPayload",
        }
    }
}
