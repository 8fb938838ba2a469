//! Local Runner - 本地单次执行
//!
//! 读取 `test_input.json` 形式的负载，执行一次任务后返回响应，
//! 对应无服务器 SDK 的本地测试模式

use serde_json::Value;
use std::path::Path;

use crate::application::commands::handlers::RunJobHandler;
use crate::application::commands::{ResponsePayload, RunJobCommand};
use crate::application::error::JobError;
use crate::domain::synthesis::{JobId, ValidationError};

/// 执行测试输入文件中的任务
///
/// 文件不可读或不是合法 JSON 时返回 MalformedPayload 失败响应，不会报错退出
pub async fn run_test_input(path: impl AsRef<Path>, handler: &RunJobHandler) -> ResponsePayload {
    let path = path.as_ref();
    tracing::info!(path = %path.display(), "Running local test input");

    let payload = match read_payload(path).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid test input");
            return ResponsePayload::failed(&JobId::new(), &JobError::from(e));
        }
    };

    handler.handle(RunJobCommand::from_payload(payload)).await
}

async fn read_payload(path: &Path) -> Result<Value, ValidationError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| ValidationError::malformed(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_slice(&raw)
        .map_err(|e| ValidationError::malformed(format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::handlers::{RequestValidator, ValidatorConfig};
    use crate::application::WorkerHealth;
    use crate::infrastructure::adapters::{
        PcmAudioEncoder, ReferenceResolverConfig, SymphoniaReferenceResolver,
    };
    use crate::infrastructure::memory::InMemoryJobTracker;
    use crate::infrastructure::model::{LazyModelLoader, SyntheticConfig, SyntheticModelSource};
    use crate::infrastructure::worker::{ExecutorConfig, FifoSynthesisExecutor};
    use std::sync::Arc;

    fn handler() -> RunJobHandler {
        let references =
            Arc::new(SymphoniaReferenceResolver::new(ReferenceResolverConfig::default()).unwrap());
        let tracker = InMemoryJobTracker::new(16).arc();
        RunJobHandler::new(
            Arc::new(RequestValidator::new(references, ValidatorConfig::default())),
            Arc::new(LazyModelLoader::new(Arc::new(SyntheticModelSource::new(
                SyntheticConfig::default(),
            )))),
            Arc::new(FifoSynthesisExecutor::new(
                ExecutorConfig::default(),
                tracker.clone(),
            )),
            Arc::new(PcmAudioEncoder::default()),
            tracker,
            Arc::new(WorkerHealth::new()),
        )
    }

    #[tokio::test]
    async fn test_runs_test_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_input.json");
        std::fs::write(
            &path,
            r#"{"id": "local-1", "input": {"text": "Hello world", "output_format": "wav"}}"#,
        )
        .unwrap();

        let response = run_test_input(&path, &handler()).await;
        assert!(response.is_completed(), "{:?}", response);
        assert_eq!(response.id(), "local-1");
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_input.json");
        std::fs::write(&path, "{ not json").unwrap();

        let response = run_test_input(&path, &handler()).await;
        assert_eq!(response.error().unwrap().kind, "MalformedPayload");
    }

    #[tokio::test]
    async fn test_missing_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let response = run_test_input(dir.path().join("absent.json"), &handler()).await;
        assert_eq!(response.error().unwrap().kind, "MalformedPayload");
    }
}
