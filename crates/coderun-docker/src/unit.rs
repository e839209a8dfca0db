//! Unit identity and lifecycle state.

use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque identifier the runtime assigned to a unit (a container id for Docker).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(String);

impl UnitId {
    /// Wrap a runtime-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, the way `docker ps` prints ids.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a unit.
///
/// Created → Running → (Exited | TimedOut | Errored) → Removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Created but not started
    Created,
    /// Started and not yet terminated
    Running,
    /// Terminated on its own with an exit code
    Exited,
    /// Killed because the deadline expired
    TimedOut,
    /// Start or wait failed, or the run was cancelled
    Errored,
    /// Stopped and removed from the runtime
    Removed,
}

impl UnitState {
    /// Whether the unit has reached a terminal run state (before removal).
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Exited | Self::TimedOut | Self::Errored)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Created => write!(f, "created"),
            UnitState::Running => write!(f, "running"),
            UnitState::Exited => write!(f, "exited"),
            UnitState::TimedOut => write!(f, "timed-out"),
            UnitState::Errored => write!(f, "errored"),
            UnitState::Removed => write!(f, "removed"),
        }
    }
}

/// A unit as reported by the runtime's listing.
#[derive(Debug, Clone)]
pub struct UnitSummary {
    pub id: UnitId,
    pub image: String,
    /// Runtime-reported state string (`created`, `running`, `exited`, ...).
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
}
