//! Docker-backed runtime using bollard.

use crate::config::{UnitConfig, MANAGED_LABEL};
use crate::error::{Result, RuntimeError};
use crate::runtime::{CapturedLogs, IsolationRuntime};
use crate::unit::{UnitId, UnitSummary};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::time::Duration;

/// Runtime driving units as Docker containers.
///
/// `bollard::Docker` is a cheap, clonable handle that can be shared across
/// tasks, so one `DockerRuntime` serves every execution.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's local socket.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Wrap an existing bollard client.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        Ok(())
    }
}

/// Translate a unit configuration into the Docker host config.
pub(crate) fn host_config(config: &UnitConfig) -> HostConfig {
    let mounts = config.bind.as_ref().map(|bind| {
        vec![Mount {
            typ: Some(MountTypeEnum::BIND),
            source: Some(bind.source.to_string_lossy().into_owned()),
            target: Some(bind.target.clone()),
            read_only: Some(bind.read_only),
            ..Default::default()
        }]
    });

    HostConfig {
        network_mode: config.network_disabled.then(|| "none".to_string()),
        mounts,
        nano_cpus: config.limits.map(|l| l.nano_cpus),
        memory: config.limits.map(|l| l.memory_bytes),
        ..Default::default()
    }
}

/// Translate a unit configuration into the Docker create body.
pub(crate) fn container_config(config: &UnitConfig) -> Config<String> {
    Config {
        image: Some(config.image.clone()),
        cmd: Some(config.cmd.clone()),
        tty: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        network_disabled: Some(config.network_disabled),
        labels: Some(config.labels.clone()),
        host_config: Some(host_config(config)),
        ..Default::default()
    }
}

/// 304 (already stopped) and 404 (already gone) are success for teardown.
fn is_benign_teardown_error(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 304 | 404,
            ..
        }
    )
}

#[async_trait]
impl IsolationRuntime for DockerRuntime {
    async fn create(&self, config: &UnitConfig) -> Result<UnitId> {
        config.validate()?;

        let options = CreateContainerOptions {
            name: config.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config(config))
            .await
            .map_err(|e| RuntimeError::Create(e.to_string()))?;

        for warning in &response.warnings {
            tracing::warn!(name = %config.name, warning = %warning, "Docker create warning");
        }

        let id = UnitId::from(response.id);
        tracing::debug!(unit_id = %id, name = %config.name, image = %config.image, "Container created");
        Ok(id)
    }

    async fn start(&self, id: &UnitId) -> Result<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start(e.to_string()))?;
        tracing::debug!(unit_id = %id, "Container started");
        Ok(())
    }

    async fn wait(&self, id: &UnitId) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id.as_str(), Some(options));

        // bollard reports a nonzero exit as an error carrying the code.
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::Wait(e.to_string())),
            None => Err(RuntimeError::Wait(
                "wait stream closed without a status".into(),
            )),
        }
    }

    async fn logs(&self, id: &UnitId, max_bytes: usize) -> Result<CapturedLogs> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id.as_str(), Some(options));
        let mut captured = CapturedLogs::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RuntimeError::Logs(e.to_string()))?;
            if !captured.push(&chunk.into_bytes(), max_bytes) {
                tracing::debug!(unit_id = %id, max_bytes, "Output truncated");
                break;
            }
        }

        Ok(captured)
    }

    async fn stop(&self, id: &UnitId, grace: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_benign_teardown_error(&e) => Ok(()),
            Err(e) => Err(RuntimeError::Stop(e.to_string())),
        }
    }

    async fn remove(&self, id: &UnitId) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_benign_teardown_error(&e) => Ok(()),
            Err(e) => Err(RuntimeError::Remove(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<UnitSummary>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{MANAGED_LABEL}=true")]);

        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::List(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(UnitSummary {
                    id: UnitId::from(id),
                    image: c.image.unwrap_or_default(),
                    state: c.state.unwrap_or_default(),
                    created_at: c
                        .created
                        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
                })
            })
            .collect())
    }

    async fn pull(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| RuntimeError::Pull {
                image: image.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(image = %image, "Image pulled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::UnitBuilder;

    fn sample() -> UnitConfig {
        UnitBuilder::new()
            .name("coderun-sample")
            .image("golang:alpine")
            .cmd(["sh", "-c", "go run /runner/main.go"])
            .bind("/srv/coderun/temp/abc", "/runner/main.go")
            .limits(100_000_000, 50 * 1024 * 1024)
            .build_config()
            .unwrap()
    }

    #[test]
    fn test_host_config_isolation() {
        let host = host_config(&sample());
        assert_eq!(host.network_mode.as_deref(), Some("none"));
        assert_eq!(host.nano_cpus, Some(100_000_000));
        assert_eq!(host.memory, Some(52_428_800));

        let mounts = host.mounts.expect("bind mount");
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].typ, Some(MountTypeEnum::BIND));
        assert_eq!(mounts[0].source.as_deref(), Some("/srv/coderun/temp/abc"));
        assert_eq!(mounts[0].target.as_deref(), Some("/runner/main.go"));
    }

    #[test]
    fn test_host_config_without_limits() {
        let config = UnitConfig {
            limits: None,
            ..sample()
        };
        let host = host_config(&config);
        assert!(host.nano_cpus.is_none());
        assert!(host.memory.is_none());
    }

    #[test]
    fn test_container_config() {
        let body = container_config(&sample());
        assert_eq!(body.image.as_deref(), Some("golang:alpine"));
        assert_eq!(body.tty, Some(false));
        assert_eq!(body.network_disabled, Some(true));
        assert_eq!(
            body.cmd.unwrap(),
            vec!["sh".to_string(), "-c".into(), "go run /runner/main.go".into()]
        );
        assert_eq!(
            body.labels.unwrap().get(MANAGED_LABEL).map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_benign_teardown_errors() {
        let not_modified = BollardError::DockerResponseServerError {
            status_code: 304,
            message: "container already stopped".into(),
        };
        let gone = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "no such container".into(),
        };
        let conflict = BollardError::DockerResponseServerError {
            status_code: 409,
            message: "removal in progress".into(),
        };
        assert!(is_benign_teardown_error(&not_modified));
        assert!(is_benign_teardown_error(&gone));
        assert!(!is_benign_teardown_error(&conflict));
    }
}
