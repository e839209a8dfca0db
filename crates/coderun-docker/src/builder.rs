//! Builder pattern for ergonomic unit configuration.

use crate::config::{BindMount, UnitConfig, UnitLimits};
use crate::error::Result;
use std::path::PathBuf;

/// Fluent builder for [`UnitConfig`].
///
/// # Example
///
/// ```
/// use coderun_docker::UnitBuilder;
///
/// let config = UnitBuilder::new()
///     .image("golang:alpine")
///     .cmd(["sh", "-c", "cd /runner && go run main.go"])
///     .bind("/srv/coderun/temp/1234", "/runner/main.go")
///     .build_config()
///     .unwrap();
///
/// assert!(config.network_disabled);
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnitBuilder {
    config: UnitConfig,
}

impl UnitBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unit name (defaults to `coderun-<uuid>`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the image reference.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    /// Set the command argument vector.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Bind-mount a host file (as seen by the daemon) at `target`.
    pub fn bind(mut self, source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.config.bind = Some(BindMount {
            source: source.into(),
            target: target.into(),
            read_only: false,
        });
        self
    }

    /// Make the bind mount read-only.
    pub fn bind_read_only(mut self) -> Self {
        if let Some(bind) = self.config.bind.as_mut() {
            bind.read_only = true;
        }
        self
    }

    /// Apply CPU (nano-CPUs) and memory (bytes) ceilings.
    pub fn limits(mut self, nano_cpus: i64, memory_bytes: i64) -> Self {
        self.config.limits = Some(UnitLimits {
            nano_cpus,
            memory_bytes,
        });
        self
    }

    /// Apply ceilings when `limits` is `Some`.
    pub fn maybe_limits(mut self, limits: Option<UnitLimits>) -> Self {
        self.config.limits = limits;
        self
    }

    /// Allow network access. Units are network-less unless this is called.
    pub fn with_network(mut self) -> Self {
        self.config.network_disabled = false;
        self
    }

    /// Add a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.labels.insert(key.into(), value.into());
        self
    }

    /// Validate and return the configuration.
    pub fn build_config(self) -> Result<UnitConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MANAGED_LABEL;

    #[test]
    fn test_builder_success() {
        let config = UnitBuilder::new()
            .name("coderun-test")
            .image("golang:alpine")
            .cmd(["sh", "-c", "true"])
            .bind("/srv/temp/abc", "/runner/main.go")
            .bind_read_only()
            .limits(100_000_000, 50 * 1024 * 1024)
            .label("runner", "golang-latest")
            .build_config()
            .expect("should build successfully");

        assert_eq!(config.name, "coderun-test");
        assert_eq!(config.image, "golang:alpine");
        assert_eq!(config.cmd, vec!["sh", "-c", "true"]);
        let bind = config.bind.as_ref().unwrap();
        assert_eq!(bind.source, PathBuf::from("/srv/temp/abc"));
        assert_eq!(bind.target, "/runner/main.go");
        assert!(bind.read_only);
        assert_eq!(
            config.limits,
            Some(UnitLimits {
                nano_cpus: 100_000_000,
                memory_bytes: 52_428_800
            })
        );
        assert_eq!(config.labels.get("runner").unwrap(), "golang-latest");
        assert_eq!(config.labels.get(MANAGED_LABEL).unwrap(), "true");
        assert!(config.network_disabled);
    }

    #[test]
    fn test_builder_missing_image() {
        let result = UnitBuilder::new().cmd(["true"]).build_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_network() {
        let config = UnitBuilder::new()
            .image("alpine")
            .cmd(["true"])
            .with_network()
            .build_config()
            .unwrap();
        assert!(!config.network_disabled);
    }

    #[test]
    fn test_maybe_limits_none() {
        let config = UnitBuilder::new()
            .image("alpine")
            .cmd(["true"])
            .maybe_limits(None)
            .build_config()
            .unwrap();
        assert!(config.limits.is_none());
    }
}
