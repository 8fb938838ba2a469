//! HTTP Routes
//!
//! API Endpoints:
//! - /runsync           POST  同步执行任务，返回完整响应负载
//! - /run               POST  异步提交任务，返回 {id, status: "IN_QUEUE"}
//! - /status/{job_id}   GET   查询任务状态及最终响应
//! - /health            GET   Worker 健康状态（致命错误后返回 503）
//! - /ping              GET   存活探测

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runsync", post(handlers::run_sync))
        .route("/run", post(handlers::run_async))
        .route("/status/:job_id", get(handlers::job_status))
        .route("/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
}
