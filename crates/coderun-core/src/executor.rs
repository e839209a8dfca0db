//! Execution entry point.

use crate::config::ExecutorConfig;
use crate::error::{CoreError, Result};
use crate::lifecycle::UnitLifecycle;
use crate::registry::RunnerRegistry;
use crate::report::ExecutionResult;
use crate::stager::Stager;
use coderun_docker::{IsolationRuntime, UnitSummary};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// A request to run `source` with the runner named `runner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub runner: String,
    pub source: String,
}

impl ExecutionRequest {
    pub fn new(runner: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            source: source.into(),
        }
    }
}

/// Runs submissions in fresh, isolated units.
///
/// Cheap to clone; clones share the registry and the runtime handle. Each call
/// to [`Executor::execute`] is independent, so any number may run concurrently.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<RunnerRegistry>,
    stager: Stager,
    lifecycle: UnitLifecycle,
}

impl Executor {
    /// Create an executor.
    pub fn new(
        registry: Arc<RunnerRegistry>,
        runtime: Arc<dyn IsolationRuntime>,
        stager: Stager,
        config: ExecutorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            stager,
            lifecycle: UnitLifecycle::new(runtime, config),
        })
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    pub fn stager(&self) -> &Stager {
        &self.stager
    }

    pub fn config(&self) -> &ExecutorConfig {
        self.lifecycle.config()
    }

    /// Run a submission to completion.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.execute_until(request, std::future::pending()).await
    }

    /// Run a submission, giving up early once `cancel` resolves.
    ///
    /// The unit is torn down and the staged source deleted on every path.
    pub async fn execute_until<C>(
        &self,
        request: &ExecutionRequest,
        cancel: C,
    ) -> Result<ExecutionResult>
    where
        C: Future<Output = ()> + Send,
    {
        let deadline = Instant::now() + self.config().request_timeout;

        let spec = self
            .registry
            .lookup(&request.runner)
            .ok_or_else(|| CoreError::UnknownRunner(request.runner.clone()))?;

        let staged = self.stager.stage(&request.source).await?;
        tracing::debug!(
            runner = %spec.id,
            bytes = staged.len(),
            "Executing submission"
        );

        let result = self.lifecycle.run(spec, staged, deadline, cancel).await;
        match &result {
            Ok(r) => tracing::info!(
                runner = %spec.id,
                exit_code = r.exit_code,
                duration_ms = r.duration.as_millis() as u64,
                truncated = r.truncated,
                "Execution finished"
            ),
            Err(e) => tracing::info!(runner = %spec.id, error = %e, "Execution failed"),
        }
        result
    }

    /// Pull every image the registry references.
    ///
    /// Returns the images that could not be pulled.
    pub async fn prepare_images(&self) -> Vec<(String, CoreError)> {
        let mut failed = Vec::new();
        for image in self.registry.images() {
            tracing::info!(image, "Pulling image");
            if let Err(e) = self.lifecycle.runtime().pull(image).await {
                tracing::warn!(image, error = %e, "Failed to pull image");
                failed.push((image.to_string(), CoreError::Runtime(e)));
            }
        }
        failed
    }

    /// Units created by this service that still exist.
    pub async fn live_units(&self) -> Result<Vec<UnitSummary>> {
        Ok(self.lifecycle.runtime().list().await?)
    }

    /// Force-remove every labelled unit, e.g. those left by a crash.
    ///
    /// Returns how many were removed. Must not run while executions are in flight.
    pub async fn reap_orphans(&self) -> Result<usize> {
        let runtime = self.lifecycle.runtime();
        let units = runtime.list().await?;
        let mut reaped = 0;
        for unit in units {
            match runtime.remove(&unit.id).await {
                Ok(()) => {
                    tracing::info!(unit_id = %unit.id, image = %unit.image, state = %unit.state, "Reaped orphan unit");
                    reaped += 1;
                }
                Err(e) => tracing::warn!(unit_id = %unit.id, error = %e, "Failed to reap unit"),
            }
        }
        Ok(reaped)
    }
}
