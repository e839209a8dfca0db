//! The isolation runtime seam.

use crate::config::UnitConfig;
use crate::error::Result;
use crate::unit::{UnitId, UnitSummary};
use async_trait::async_trait;
use std::time::Duration;

/// Marker appended to output that hit the capture limit.
pub const TRUNCATION_MARKER: &[u8] = b"\n... [output truncated]";

/// Combined stdout and stderr of a unit, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLogs {
    pub output: Vec<u8>,
    /// Set when output was cut at the capture limit.
    pub truncated: bool,
}

impl CapturedLogs {
    /// Append a chunk, keeping at most `max_bytes` of output.
    ///
    /// Returns `false` once the limit has been reached; further chunks are ignored.
    pub fn push(&mut self, chunk: &[u8], max_bytes: usize) -> bool {
        if self.truncated {
            return false;
        }
        let room = max_bytes.saturating_sub(self.output.len());
        if chunk.len() <= room {
            self.output.extend_from_slice(chunk);
            return true;
        }
        self.output.extend_from_slice(&chunk[..room]);
        self.output.extend_from_slice(TRUNCATION_MARKER);
        self.truncated = true;
        false
    }
}

/// Control interface of an isolation runtime.
///
/// Implementations must be safe for concurrent use: one handle is shared by
/// every in-flight execution.
#[async_trait]
pub trait IsolationRuntime: Send + Sync {
    /// Create (but do not start) a unit.
    async fn create(&self, config: &UnitConfig) -> Result<UnitId>;

    /// Start a created unit.
    async fn start(&self, id: &UnitId) -> Result<()>;

    /// Block until the unit stops running and return its exit code.
    async fn wait(&self, id: &UnitId) -> Result<i64>;

    /// Fetch combined stdout and stderr, keeping at most `max_bytes`.
    async fn logs(&self, id: &UnitId, max_bytes: usize) -> Result<CapturedLogs>;

    /// Stop the unit, killing it after `grace`.
    async fn stop(&self, id: &UnitId, grace: Duration) -> Result<()>;

    /// Force-remove the unit together with its anonymous volumes.
    async fn remove(&self, id: &UnitId) -> Result<()>;

    /// List every unit carrying the coderun ownership label.
    async fn list(&self) -> Result<Vec<UnitSummary>>;

    /// Pull (or refresh) an image.
    async fn pull(&self, image: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_limit() {
        let mut logs = CapturedLogs::default();
        assert!(logs.push(b"hello ", 16));
        assert!(logs.push(b"world", 16));
        assert_eq!(logs.output, b"hello world");
        assert!(!logs.truncated);
    }

    #[test]
    fn test_push_truncates_at_limit() {
        let mut logs = CapturedLogs::default();
        assert!(logs.push(b"abcd", 6));
        assert!(!logs.push(b"efgh", 6));
        assert!(logs.truncated);
        assert!(logs.output.starts_with(b"abcdef"));
        assert!(logs.output.ends_with(TRUNCATION_MARKER));

        // ignored after truncation
        let len = logs.output.len();
        assert!(!logs.push(b"more", 6));
        assert_eq!(logs.output.len(), len);
    }
}
