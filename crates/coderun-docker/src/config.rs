//! Unit configuration types.

use crate::error::{Result, RuntimeError};
use std::collections::HashMap;
use std::path::PathBuf;

/// Label attached to every unit created by coderun.
///
/// Listing and orphan reaping filter on `coderun.managed=true`.
pub const MANAGED_LABEL: &str = "coderun.managed";

/// Host file bind-mounted into the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Path as seen by the Docker daemon.
    pub source: PathBuf,
    /// Absolute path inside the unit.
    pub target: String,
    pub read_only: bool,
}

/// CPU and memory ceilings, in the units the Docker API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLimits {
    /// CPU quota in units of 10^-9 CPUs.
    pub nano_cpus: i64,
    /// Memory ceiling in bytes.
    pub memory_bytes: i64,
}

/// Everything needed to create one isolated unit.
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Unit name; unique per unit.
    pub name: String,
    /// Image reference (`golang:alpine`).
    pub image: String,
    /// Command argument vector.
    pub cmd: Vec<String>,
    pub bind: Option<BindMount>,
    pub limits: Option<UnitLimits>,
    /// When true the unit runs with `network_mode = "none"`.
    pub network_disabled: bool,
    pub labels: HashMap<String, String>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        Self {
            name: format!("coderun-{}", uuid::Uuid::new_v4()),
            image: String::new(),
            cmd: Vec::new(),
            bind: None,
            limits: None,
            network_disabled: true,
            labels,
        }
    }
}

impl UnitConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(RuntimeError::Config("image is required".into()));
        }
        if self.cmd.is_empty() {
            return Err(RuntimeError::Config("cmd must not be empty".into()));
        }
        if let Some(bind) = &self.bind {
            if !bind.target.starts_with('/') {
                return Err(RuntimeError::Config(format!(
                    "bind target must be absolute: {}",
                    bind.target
                )));
            }
            if bind.source.as_os_str().is_empty() {
                return Err(RuntimeError::Config("bind source is required".into()));
            }
        }
        if let Some(limits) = &self.limits {
            if limits.nano_cpus <= 0 {
                return Err(RuntimeError::Config("nano_cpus must be > 0".into()));
            }
            if limits.memory_bytes <= 0 {
                return Err(RuntimeError::Config("memory_bytes must be > 0".into()));
            }
        }
        Ok(())
    }

    /// Whether this unit carries the coderun ownership label.
    pub fn is_managed(&self) -> bool {
        self.labels.get(MANAGED_LABEL).map(String::as_str) == Some("true")
    }
}
