//! HTTP error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use coderun_core::CoreError;
use serde_json::json;

/// Realm advertised on authentication failure.
pub const AUTH_REALM: &str = "Basic realm=\"Restricted\"";

/// Errors returned to HTTP clients.
///
/// Execution failures are deliberately opaque; details go to the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("runner not found")]
    RunnerNotFound,

    #[error("execution failed")]
    ExecutionFailed,
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownRunner(_) => Self::RunnerNotFound,
            _ => Self::ExecutionFailed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RunnerNotFound => StatusCode::NOT_FOUND,
            ApiError::ExecutionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTH_REALM),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ApiError::from(CoreError::UnknownRunner("x".into())),
            ApiError::RunnerNotFound
        ));
        assert!(matches!(
            ApiError::from(CoreError::Timeout(Duration::from_secs(60))),
            ApiError::ExecutionFailed
        ));
        assert!(matches!(
            ApiError::from(CoreError::Cancelled),
            ApiError::ExecutionFailed
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::RunnerNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::ExecutionFailed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            AUTH_REALM
        );
    }
}
