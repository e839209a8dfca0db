//! Execution results.

use coderun_docker::CapturedLogs;
use std::borrow::Cow;
use std::time::Duration;

/// Outcome of a program that ran to termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code reported by the runtime.
    pub exit_code: i64,
    /// Combined stdout and stderr, possibly truncated.
    pub output: Vec<u8>,
    /// Output was cut at the capture limit.
    pub truncated: bool,
    /// False when the log fetch failed and `output` is empty for that reason.
    pub logs_captured: bool,
    /// Wall time from the create request until the unit exited.
    ///
    /// Excludes the log fetch and teardown.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Build a result from an exit code and whatever output could be fetched.
    pub fn from_exit(exit_code: i64, logs: Option<CapturedLogs>, duration: Duration) -> Self {
        let logs_captured = logs.is_some();
        let logs = logs.unwrap_or_default();
        Self {
            exit_code,
            output: logs.output,
            truncated: logs.truncated,
            logs_captured,
            duration,
        }
    }

    /// Check if the program succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Success flag as sent to clients: `1` for exit code 0, `0` otherwise.
    ///
    /// This is a boolean, not a process status. Clients that want the real
    /// exit code should read [`ExecutionResult::exit_code`].
    pub fn status_flag(&self) -> i32 {
        i32::from(self.success())
    }

    /// Output as text, replacing invalid UTF-8.
    pub fn output_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}
