//! Executor configuration types.

use crate::error::CoreError;
use std::time::Duration;

/// Default deadline for a unit to terminate, measured from the start of the wait.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Default overall bound on one request (start and log fetch included).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Default cap on captured output (1 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Settings shared by every execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Apply each runner's CPU and memory limit.
    pub apply_limits: bool,
    /// Deadline for the unit to terminate (default: 60s).
    pub exec_timeout: Duration,
    /// Bound on the whole request; start and log fetch inherit it (default: 90s).
    pub request_timeout: Duration,
    /// Output beyond this is dropped with a truncation marker (default: 1 MiB).
    pub max_output_bytes: usize,
    /// Grace period before stop kills the unit (default: zero).
    pub stop_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            apply_limits: true,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            stop_grace: Duration::ZERO,
        }
    }
}

impl ExecutorConfig {
    /// Create a new config builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.exec_timeout.is_zero() {
            return Err(CoreError::Config("exec_timeout must be > 0".into()));
        }
        if self.request_timeout < self.exec_timeout {
            return Err(CoreError::Config(
                "request_timeout must be >= exec_timeout".into(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(CoreError::Config("max_output_bytes must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for ExecutorConfig.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Enable or disable resource limits.
    pub fn apply_limits(mut self, apply: bool) -> Self {
        self.config.apply_limits = apply;
        self
    }

    /// Set the execution deadline.
    pub fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.config.exec_timeout = timeout;
        self
    }

    /// Set the overall request deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the output cap in bytes.
    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    /// Set the stop grace period.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.config.stop_grace = grace;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ExecutorConfig, CoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExecutorConfig::default();
        assert!(config.apply_limits);
        assert_eq!(config.exec_timeout, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert!(config.stop_grace.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_success() {
        let config = ExecutorConfig::builder()
            .apply_limits(false)
            .exec_timeout(Duration::from_secs(5))
            .request_timeout(Duration::from_secs(10))
            .max_output_bytes(4096)
            .build()
            .expect("should build successfully");

        assert!(!config.apply_limits);
        assert_eq!(config.exec_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_output_bytes, 4096);
    }

    #[test]
    fn test_builder_zero_timeout() {
        let result = ExecutorConfig::builder()
            .exec_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_request_shorter_than_exec() {
        let result = ExecutorConfig::builder()
            .exec_timeout(Duration::from_secs(60))
            .request_timeout(Duration::from_secs(30))
            .build();
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
