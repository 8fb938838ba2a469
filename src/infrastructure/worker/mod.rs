//! Worker Layer - GPU 任务执行
//!
//! 实现 FIFO 准入的合成执行器，以及本地单次执行入口

mod local_runner;
mod synthesis_executor;

pub use local_runner::run_test_input;
pub use synthesis_executor::{ExecutorConfig, FifoSynthesisExecutor};
