//! Error types for coderun-core.

use coderun_docker::RuntimeError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for coderun-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can terminate an execution request.
///
/// Only teardown failures are absent: they are logged and swallowed once the
/// outcome of a request is known.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No runner registered under this identifier
    #[error("runner not found: {0}")]
    UnknownRunner(String),

    /// Writing the source to the staging directory failed
    #[error("failed to stage source: {0}")]
    Staging(#[source] std::io::Error),

    /// The runtime rejected the unit
    #[error("failed to create unit: {0}")]
    Create(#[source] RuntimeError),

    /// The unit was created but did not start
    #[error("failed to start unit: {0}")]
    Start(String),

    /// Waiting for the unit failed
    #[error("execution failed: {0}")]
    Wait(String),

    /// The unit outlived the execution deadline
    #[error("execute timeout after {0:?}")]
    Timeout(Duration),

    /// The caller went away before the unit finished
    #[error("execution cancelled")]
    Cancelled,

    /// Invalid runner catalogue
    #[error("registry error: {0}")]
    Registry(String),

    /// Invalid executor configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Runtime error outside an execution (listing, pulling)
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl CoreError {
    /// Whether this error is the execution deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the request named an unknown runner.
    pub fn is_unknown_runner(&self) -> bool {
        matches!(self, Self::UnknownRunner(_))
    }
}
