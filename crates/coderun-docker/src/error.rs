//! Error types for coderun-docker.

use thiserror::Error;

/// Result type alias for coderun-docker operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while driving an isolated unit.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Could not reach the Docker daemon
    #[error("failed to connect to Docker: {0}")]
    Connect(String),

    /// Invalid unit configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The daemon rejected the unit
    #[error("failed to create unit: {0}")]
    Create(String),

    /// The unit exists but could not be started
    #[error("failed to start unit: {0}")]
    Start(String),

    /// Waiting for termination failed
    #[error("failed to wait for unit: {0}")]
    Wait(String),

    /// Fetching stdout/stderr failed
    #[error("failed to fetch logs: {0}")]
    Logs(String),

    /// Failed to stop the unit
    #[error("failed to stop unit: {0}")]
    Stop(String),

    /// Failed to remove the unit
    #[error("failed to remove unit: {0}")]
    Remove(String),

    /// Listing units failed
    #[error("failed to list units: {0}")]
    List(String),

    /// Image pull failed
    #[error("failed to pull image {image}: {message}")]
    Pull {
        /// Image reference that was requested
        image: String,
        /// Daemon error message
        message: String,
    },
}
