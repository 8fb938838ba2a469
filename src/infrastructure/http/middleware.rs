//! HTTP Middleware
//!
//! 4xx / 5xx 响应日志

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// 状态码错误日志中间件
///
/// 任务失败以 200 + FAILED 负载返回，不在这里记录；这里只记录路由层面的错误
/// （未知任务、Worker 不健康、请求体超限等）
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::util::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/runsync", post(|| async { "{}" }))
            .route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_responses_pass_through() {
        assert_eq!(status_of("POST", "/runsync").await, StatusCode::OK);
        assert_eq!(
            status_of("GET", "/health").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of("GET", "/unknown").await, StatusCode::NOT_FOUND);
        assert_eq!(
            status_of("GET", "/runsync").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
