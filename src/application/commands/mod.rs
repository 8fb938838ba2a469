//! 应用层 - 命令
//!
//! 推理任务命令、响应负载及其处理器

mod job_commands;

pub mod handlers;

pub use job_commands::*;
