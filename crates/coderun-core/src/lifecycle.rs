//! Unit lifecycle: create, start, wait, collect, tear down.
//!
//! Every unit that is successfully created is stopped and removed before
//! [`UnitLifecycle::run`] returns, whatever the outcome. If the future is
//! dropped mid-run, teardown is spawned onto the current runtime instead.

use crate::config::ExecutorConfig;
use crate::error::{CoreError, Result};
use crate::registry::RunnerSpec;
use crate::report::ExecutionResult;
use crate::stager::StagedSource;
use crate::supervisor::{await_exit, WaitOutcome};
use coderun_docker::{CapturedLogs, IsolationRuntime, UnitBuilder, UnitConfig, UnitId, UnitState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Label recording which runner a unit was created for.
pub const RUNNER_LABEL: &str = "coderun.runner";

/// Bound on each teardown call.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives one unit from creation to removal.
#[derive(Clone)]
pub struct UnitLifecycle {
    runtime: Arc<dyn IsolationRuntime>,
    config: ExecutorConfig,
}

impl UnitLifecycle {
    pub fn new(runtime: Arc<dyn IsolationRuntime>, config: ExecutorConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<dyn IsolationRuntime> {
        &self.runtime
    }

    /// Unit configuration for running `staged` with `spec`.
    pub fn unit_config(&self, spec: &RunnerSpec, staged: &StagedSource) -> Result<UnitConfig> {
        let limits = match spec.limit.filter(|_| self.config.apply_limits) {
            Some(l) => match (l.nano_cpus(), l.memory_bytes()) {
                (Some(nano_cpus), Some(memory_bytes)) => Some(coderun_docker::UnitLimits {
                    nano_cpus,
                    memory_bytes,
                }),
                _ => {
                    return Err(CoreError::Registry(format!(
                        "{}: limits out of range",
                        spec.id
                    )))
                }
            },
            None => None,
        };

        UnitBuilder::new()
            .image(&spec.image)
            .cmd(&spec.cmd)
            .bind(staged.bind_path(), &spec.target)
            .maybe_limits(limits)
            .label(RUNNER_LABEL, &spec.id)
            .build_config()
            .map_err(CoreError::Create)
    }

    /// Run `staged` under `spec` and tear the unit down.
    ///
    /// Start and log fetch are bounded by `deadline`; the wait is bounded by
    /// the configured execution timeout. `cancel` resolving ends the wait early.
    /// The staged file is released only after the unit has been removed.
    pub async fn run<C>(
        &self,
        spec: &RunnerSpec,
        staged: StagedSource,
        deadline: Instant,
        cancel: C,
    ) -> Result<ExecutionResult>
    where
        C: Future<Output = ()>,
    {
        let begun = Instant::now();

        let unit_config = match self.unit_config(spec, &staged) {
            Ok(config) => config,
            Err(e) => {
                staged.release().await;
                return Err(e);
            }
        };

        let id = match self.runtime.create(&unit_config).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(runner = %spec.id, error = %e, "Failed to create unit");
                staged.release().await;
                return Err(CoreError::Create(e));
            }
        };
        tracing::debug!(unit_id = %id, runner = %spec.id, state = %UnitState::Created, "Unit created");

        let guard = TeardownGuard::new(
            Arc::clone(&self.runtime),
            id.clone(),
            staged,
            self.config.stop_grace,
        );

        let outcome = self.drive(&id, deadline, cancel, begun).await;

        guard.finish().await;
        tracing::debug!(
            unit_id = %id,
            state = %UnitState::Removed,
            elapsed_ms = begun.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Unit finished"
        );
        outcome
    }

    async fn drive<C>(
        &self,
        id: &UnitId,
        deadline: Instant,
        cancel: C,
        begun: Instant,
    ) -> Result<ExecutionResult>
    where
        C: Future<Output = ()>,
    {
        match tokio::time::timeout_at(deadline, self.runtime.start(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(unit_id = %id, error = %e, "Failed to start unit");
                return Err(CoreError::Start(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(unit_id = %id, "Unit start exceeded request deadline");
                return Err(CoreError::Start("request deadline exceeded".into()));
            }
        }
        tracing::debug!(unit_id = %id, state = %UnitState::Running, "Unit started");

        let exit_code =
            match await_exit(self.runtime.as_ref(), id, self.config.exec_timeout, cancel).await {
                WaitOutcome::Exited(code) => code,
                WaitOutcome::TimedOut(after) => {
                    tracing::debug!(unit_id = %id, state = %UnitState::TimedOut, "Unit timed out");
                    return Err(CoreError::Timeout(after));
                }
                WaitOutcome::Failed(e) => {
                    tracing::warn!(unit_id = %id, state = %UnitState::Errored, error = %e, "Wait failed");
                    return Err(CoreError::Wait(e.to_string()));
                }
                WaitOutcome::Cancelled => return Err(CoreError::Cancelled),
            };
        let duration = begun.elapsed();
        tracing::debug!(unit_id = %id, state = %UnitState::Exited, exit_code, "Unit exited");

        let logs = self.fetch_logs(id, deadline).await;
        Ok(ExecutionResult::from_exit(exit_code, logs, duration))
    }

    /// Best-effort log fetch; a failure yields `None` rather than an error.
    async fn fetch_logs(&self, id: &UnitId, deadline: Instant) -> Option<CapturedLogs> {
        let fetch = self.runtime.logs(id, self.config.max_output_bytes);
        match tokio::time::timeout_at(deadline, fetch).await {
            Ok(Ok(logs)) => {
                if logs.truncated {
                    tracing::debug!(unit_id = %id, "Output truncated");
                }
                Some(logs)
            }
            Ok(Err(e)) => {
                tracing::warn!(unit_id = %id, error = %e, "Failed to fetch unit output");
                None
            }
            Err(_) => {
                tracing::warn!(unit_id = %id, "Log fetch exceeded request deadline");
                None
            }
        }
    }
}

/// Owns a created unit and its staged source until both are gone.
struct TeardownGuard {
    runtime: Arc<dyn IsolationRuntime>,
    unit: Option<UnitId>,
    staged: Option<StagedSource>,
    grace: Duration,
}

impl TeardownGuard {
    fn new(
        runtime: Arc<dyn IsolationRuntime>,
        unit: UnitId,
        staged: StagedSource,
        grace: Duration,
    ) -> Self {
        Self {
            runtime,
            unit: Some(unit),
            staged: Some(staged),
            grace,
        }
    }

    async fn finish(mut self) {
        let unit = self.unit.take();
        let staged = self.staged.take();
        teardown(Arc::clone(&self.runtime), unit, staged, self.grace).await;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if self.unit.is_none() && self.staged.is_none() {
            return;
        }
        let unit = self.unit.take();
        let staged = self.staged.take();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Execution dropped, spawning teardown");
                handle.spawn(teardown(Arc::clone(&self.runtime), unit, staged, self.grace));
            }
            Err(_) => {
                if let Some(id) = unit {
                    tracing::warn!(unit_id = %id, "No runtime available, unit left for orphan reaping");
                }
                // Dropping `staged` removes the file synchronously.
            }
        }
    }
}

/// Stop and remove the unit, then release the staged source.
///
/// Failures are logged and swallowed.
async fn teardown(
    runtime: Arc<dyn IsolationRuntime>,
    unit: Option<UnitId>,
    staged: Option<StagedSource>,
    grace: Duration,
) {
    if let Some(id) = unit {
        match tokio::time::timeout(TEARDOWN_TIMEOUT, runtime.stop(&id, grace)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(unit_id = %id, error = %e, "Failed to stop unit"),
            Err(_) => tracing::warn!(unit_id = %id, "Stop timed out"),
        }
        match tokio::time::timeout(TEARDOWN_TIMEOUT, runtime.remove(&id)).await {
            Ok(Ok(())) => tracing::trace!(unit_id = %id, "Unit removed"),
            Ok(Err(e)) => tracing::warn!(unit_id = %id, error = %e, "Failed to remove unit"),
            Err(_) => tracing::warn!(unit_id = %id, "Remove timed out"),
        }
    }
    if let Some(staged) = staged {
        staged.release().await;
    }
}
