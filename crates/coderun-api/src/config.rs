//! Configuration for the HTTP server.
//!
//! Loaded from a JSON file, then overridden by environment variables.

use coderun_core::{CoreError, ExecutorConfig, RunnerRegistry, RunnerSpec, Stager};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";

/// Default staging directory, relative to the working directory.
pub const DEFAULT_STAGING_DIR: &str = "data/temp";

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to resolve working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}

/// Configuration for the coderun HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Basic-auth credentials (user → password).
    pub clients: HashMap<String, String>,

    /// Staging directory as seen by the Docker daemon.
    ///
    /// Defaults to the absolute form of `staging_dir`.
    pub temp: Option<PathBuf>,

    /// Apply each runner's CPU and memory limit (default: false).
    pub limit: bool,

    /// Directory this process writes submissions into.
    pub staging_dir: PathBuf,

    /// Execution deadline in seconds (default: 60).
    pub exec_timeout_secs: u64,

    /// Overall request deadline in seconds (default: 90).
    pub request_timeout_secs: u64,

    /// Pull runner images at startup (default: true).
    pub pull_images: bool,

    /// HTTP server bind address (default: 0.0.0.0:3000).
    pub http_addr: SocketAddr,

    /// Runners added to or replacing the built-in catalogue.
    pub runners: BTreeMap<String, RunnerSpec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            clients: HashMap::new(),
            temp: None,
            limit: false,
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            exec_timeout_secs: executor.exec_timeout.as_secs(),
            request_timeout_secs: executor.request_timeout.as_secs(),
            pull_images: true,
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000),
            runners: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Read a configuration file.
    ///
    /// A missing file yields the defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the file and the environment.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `CODERUN_CONFIG` | config file path (default `data/config.json`) |
    /// | `CODERUN_HTTP_ADDR` | overrides `http_addr` |
    /// | `CODERUN_LIMIT` | overrides `limit` (`true`/`1` or `false`/`0`) |
    /// | `CODERUN_TEMP` | overrides `temp` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("CODERUN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load(path)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CODERUN_HTTP_ADDR") {
            self.http_addr = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CODERUN_HTTP_ADDR",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("CODERUN_LIMIT") {
            self.limit = match value.to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "CODERUN_LIMIT",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("CODERUN_TEMP") {
            self.temp = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Validate settings that would make every request fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.executor_config().validate()?;
        if let Some(temp) = &self.temp {
            if !temp.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "temp must be an absolute path: {}",
                    temp.display()
                )));
            }
        }
        Ok(())
    }

    /// Log likely misconfigurations without failing.
    pub fn validate_warn(&self) {
        if self.clients.is_empty() {
            tracing::warn!("No clients configured, every /api request will be rejected");
        }
        if !self.limit {
            tracing::warn!("Resource limits disabled");
        }
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            apply_limits: self.limit,
            exec_timeout: self.exec_timeout(),
            request_timeout: self.request_timeout(),
            ..Default::default()
        }
    }

    /// The built-in catalogue with configured runners merged in.
    pub fn registry(&self) -> Result<RunnerRegistry, ConfigError> {
        Ok(RunnerRegistry::builtin().merge(self.runners.clone())?)
    }

    /// Stager writing into `staging_dir` and binding from `temp`.
    pub fn stager(&self) -> Result<Stager, ConfigError> {
        let local_dir = if self.staging_dir.is_absolute() {
            self.staging_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::WorkingDir)?
                .join(&self.staging_dir)
        };
        let bind_prefix = self.temp.clone().unwrap_or_else(|| local_dir.clone());
        Ok(Stager::new(local_dir, bind_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.clients.is_empty());
        assert!(config.temp.is_none());
        assert!(!config.limit);
        assert_eq!(config.staging_dir, PathBuf::from("data/temp"));
        assert_eq!(config.exec_timeout(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(90));
        assert_eq!(config.http_addr.port(), 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_file_format() {
        let json = r#"{
            "clients": {"naiba": "secret"},
            "temp": "/srv/coderun/data/temp",
            "limit": true
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.clients.get("naiba").unwrap(), "secret");
        assert_eq!(config.temp, Some(PathBuf::from("/srv/coderun/data/temp")));
        assert!(config.limit);
        assert_eq!(config.exec_timeout_secs, 60);
        assert!(config.pull_images);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env(&[
                ("CODERUN_HTTP_ADDR", "127.0.0.1:8080"),
                ("CODERUN_LIMIT", "1"),
                ("CODERUN_TEMP", "/host/temp"),
            ]))
            .unwrap();

        assert_eq!(config.http_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(config.limit);
        assert_eq!(config.temp, Some(PathBuf::from("/host/temp")));
    }

    #[test]
    fn test_env_invalid_addr() {
        let mut config = ServerConfig::default();
        let result = config.apply_env(env(&[("CODERUN_HTTP_ADDR", "not-an-addr")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: "CODERUN_HTTP_ADDR", .. })
        ));
    }

    #[test]
    fn test_relative_temp_rejected() {
        let config = ServerConfig {
            temp: Some(PathBuf::from("data/temp")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_request_timeout_shorter_than_exec_rejected() {
        let config = ServerConfig {
            exec_timeout_secs: 60,
            request_timeout_secs: 30,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Core(_))));
    }

    #[test]
    fn test_executor_config_mapping() {
        let config = ServerConfig {
            limit: true,
            exec_timeout_secs: 5,
            request_timeout_secs: 10,
            ..Default::default()
        };
        let executor = config.executor_config();
        assert!(executor.apply_limits);
        assert_eq!(executor.exec_timeout, Duration::from_secs(5));
        assert_eq!(executor.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_stager_paths() {
        let config = ServerConfig {
            staging_dir: PathBuf::from("/var/lib/coderun/temp"),
            temp: Some(PathBuf::from("/host/coderun/temp")),
            ..Default::default()
        };
        let stager = config.stager().unwrap();
        assert_eq!(stager.local_dir(), Path::new("/var/lib/coderun/temp"));
        assert_eq!(stager.bind_prefix(), Path::new("/host/coderun/temp"));

        let config = ServerConfig::default();
        let stager = config.stager().unwrap();
        assert!(stager.local_dir().is_absolute());
        assert_eq!(stager.local_dir(), stager.bind_prefix());
    }

    #[test]
    fn test_registry_merges_runners() {
        let json = r#"{
            "runners": {
                "lua-5": {
                    "image": "nickblah/lua:5",
                    "target": "/runner/main.lua",
                    "cmd": ["lua", "/runner/main.lua"],
                    "limit": {"cpu": 10, "mem": 32}
                }
            }
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.lookup("lua-5").unwrap().id, "lua-5");
        assert!(registry.lookup("golang-latest").is_some());
    }
}
