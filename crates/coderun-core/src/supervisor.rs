//! Timeout supervisor: races unit termination against the execution deadline.

use coderun_docker::{IsolationRuntime, RuntimeError, UnitId};
use std::future::Future;
use std::time::Duration;

/// How the wait for a unit ended.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The unit terminated with this exit code.
    Exited(i64),
    /// The runtime could not report termination.
    Failed(RuntimeError),
    /// The deadline expired first.
    TimedOut(Duration),
    /// The caller gave up first.
    Cancelled,
}

/// Wait for `id` to terminate, for at most `timeout` from now.
///
/// Losing branches are dropped; the unit is torn down by the caller either way.
/// When termination and the deadline are ready together, termination wins.
pub async fn await_exit<C>(
    runtime: &dyn IsolationRuntime,
    id: &UnitId,
    timeout: Duration,
    cancel: C,
) -> WaitOutcome
where
    C: Future<Output = ()>,
{
    let deadline = tokio::time::sleep(timeout);

    tokio::select! {
        biased;

        result = runtime.wait(id) => match result {
            Ok(code) => WaitOutcome::Exited(code),
            Err(e) => WaitOutcome::Failed(e),
        },

        _ = deadline => {
            tracing::warn!(unit_id = %id, timeout_ms = timeout.as_millis() as u64, "Execution deadline expired");
            WaitOutcome::TimedOut(timeout)
        }

        _ = cancel => {
            tracing::info!(unit_id = %id, "Execution cancelled by caller");
            WaitOutcome::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderun_docker::mock::{MockBehavior, MockRuntime};
    use coderun_docker::UnitBuilder;

    async fn started(runtime: &MockRuntime) -> UnitId {
        let config = UnitBuilder::new()
            .image("alpine")
            .cmd(["run"])
            .build_config()
            .unwrap();
        let id = runtime.create(&config).await.unwrap();
        runtime.start(&id).await.unwrap();
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_before_deadline() {
        let runtime = MockRuntime::new()
            .with_default(MockBehavior::exits(4).running_for(Duration::from_secs(2)));
        let id = started(&runtime).await;

        let outcome =
            await_exit(&runtime, &id, Duration::from_secs(60), std::future::pending()).await;
        assert!(matches!(outcome, WaitOutcome::Exited(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let runtime = MockRuntime::new().with_default(MockBehavior::hangs());
        let id = started(&runtime).await;

        let begun = tokio::time::Instant::now();
        let outcome =
            await_exit(&runtime, &id, Duration::from_secs(60), std::future::pending()).await;
        assert!(matches!(outcome, WaitOutcome::TimedOut(d) if d == Duration::from_secs(60)));
        assert!(begun.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_program_times_out() {
        let runtime = MockRuntime::new()
            .with_default(MockBehavior::exits(0).running_for(Duration::from_secs(120)));
        let id = started(&runtime).await;

        let outcome =
            await_exit(&runtime, &id, Duration::from_secs(60), std::future::pending()).await;
        assert!(matches!(outcome, WaitOutcome::TimedOut(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins() {
        let runtime = MockRuntime::new().with_default(MockBehavior::hangs());
        let id = started(&runtime).await;

        let cancel = tokio::time::sleep(Duration::from_secs(1));
        let outcome = await_exit(&runtime, &id, Duration::from_secs(60), cancel).await;
        assert!(matches!(outcome, WaitOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_wait_failure() {
        let runtime = MockRuntime::new().with_default(MockBehavior::exits(0).failing_wait());
        let id = started(&runtime).await;

        let outcome =
            await_exit(&runtime, &id, Duration::from_secs(60), std::future::pending()).await;
        assert!(matches!(outcome, WaitOutcome::Failed(RuntimeError::Wait(_))));
    }
}
