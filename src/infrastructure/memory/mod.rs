//! Memory Layer - In-Memory State Management
//!
//! 实现 JobTracker，管理推理任务的内存状态

mod job_tracker;

pub use job_tracker::InMemoryJobTracker;
