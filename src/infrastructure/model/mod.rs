//! Model Layer - 模型加载与后端
//!
//! - loader: 按变体惰性加载并缓存 ModelHandle
//! - sidecar: 通过本地 HTTP 驱动 GPU 推理进程
//! - synthetic: CPU 信号发生器，用于开发和测试

mod loader;
mod sidecar;
mod synthetic;

pub use loader::LazyModelLoader;
pub use sidecar::{SidecarConfig, SidecarModel, SidecarModelSource};
pub use synthetic::{SyntheticConfig, SyntheticModel, SyntheticModelSource};
