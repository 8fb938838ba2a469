//! Reference - 参考音频解析

mod reference_resolver;

pub use reference_resolver::{ReferenceResolverConfig, SymphoniaReferenceResolver};
