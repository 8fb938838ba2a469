//! Command Handlers 实现

mod run_job_handler;
mod validate_request;

pub use run_job_handler::RunJobHandler;
pub use validate_request::{RequestValidator, ValidatorConfig};
