//! Request and response bodies.

use coderun_core::{ExecutionRequest, ExecutionResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCodeRequest {
    /// Runner identifier, e.g. `golang-latest`.
    pub container: String,
    /// Source text to run.
    pub code: String,
}

impl From<RunCodeRequest> for ExecutionRequest {
    fn from(req: RunCodeRequest) -> Self {
        ExecutionRequest::new(req.container, req.code)
    }
}

/// Response of `POST /api/run`.
///
/// `code` is a success flag, not the process exit status: `1` when the program
/// exited 0, `0` for any other exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCodeResponse {
    #[serde(rename = "code")]
    pub status: i32,
    /// Combined stdout and stderr.
    pub out: String,
}

impl From<&ExecutionResult> for RunCodeResponse {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            status: result.status_flag(),
            out: result.output_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_docker::CapturedLogs;
    use std::time::Duration;

    #[test]
    fn test_response_wire_shape() {
        let result = ExecutionResult::from_exit(
            0,
            Some(CapturedLogs {
                output: b"hello world!".to_vec(),
                truncated: false,
            }),
            Duration::ZERO,
        );
        let json = serde_json::to_value(RunCodeResponse::from(&result)).unwrap();
        assert_eq!(json, serde_json::json!({"code": 1, "out": "hello world!"}));
    }

    #[test]
    fn test_failure_flag() {
        let result = ExecutionResult::from_exit(2, None, Duration::ZERO);
        let response = RunCodeResponse::from(&result);
        assert_eq!(response.status, 0);
        assert!(response.out.is_empty());
    }

    #[test]
    fn test_request_parsing() {
        let req: RunCodeRequest =
            serde_json::from_str(r#"{"container":"golang-latest","code":"package main"}"#).unwrap();
        let exec = ExecutionRequest::from(req);
        assert_eq!(exec.runner, "golang-latest");
        assert_eq!(exec.source, "package main");
    }
}
