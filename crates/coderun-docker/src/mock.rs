//! In-memory runtime for tests.
//!
//! `MockRuntime` behaves like a Docker daemon whose units run a scripted
//! program: each image maps to a [`MockBehavior`] describing the exit code,
//! output, run time and which lifecycle calls fail. It records every call so
//! tests can check that units created == units removed.

use crate::config::UnitConfig;
use crate::error::{Result, RuntimeError};
use crate::runtime::{CapturedLogs, IsolationRuntime};
use crate::unit::{UnitId, UnitState, UnitSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted behavior of a mock unit.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Time between start and exit.
    pub run_for: Duration,
    /// Never exits on its own.
    pub hang: bool,
    pub fail_create: bool,
    pub fail_start: bool,
    pub fail_wait: bool,
    pub fail_logs: bool,
    pub fail_remove: bool,
}

impl MockBehavior {
    /// A program that exits immediately with `code`.
    pub fn exits(code: i64) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    /// A program that never terminates.
    pub fn hangs() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn with_stdout(mut self, out: impl AsRef<[u8]>) -> Self {
        self.stdout = out.as_ref().to_vec();
        self
    }

    pub fn with_stderr(mut self, err: impl AsRef<[u8]>) -> Self {
        self.stderr = err.as_ref().to_vec();
        self
    }

    pub fn running_for(mut self, duration: Duration) -> Self {
        self.run_for = duration;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_wait(mut self) -> Self {
        self.fail_wait = true;
        self
    }

    pub fn failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }
}

#[derive(Debug)]
struct MockUnit {
    config: UnitConfig,
    behavior: MockBehavior,
    state: UnitState,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    units: HashMap<UnitId, MockUnit>,
    created: usize,
    removed: usize,
    stopped: usize,
    configs: Vec<UnitConfig>,
    staged: Vec<Option<Vec<u8>>>,
    pulled: Vec<String>,
}

/// Mock implementation of [`IsolationRuntime`].
#[derive(Debug, Default)]
pub struct MockRuntime {
    default_behavior: MockBehavior,
    behaviors: HashMap<String, MockBehavior>,
    state: Mutex<MockState>,
}

impl MockRuntime {
    /// A runtime whose units all exit 0 with no output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Behavior for images without a specific script.
    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Script units created from `image`.
    pub fn with_image(mut self, image: impl Into<String>, behavior: MockBehavior) -> Self {
        self.behaviors.insert(image.into(), behavior);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn behavior_of(&self, id: &UnitId) -> Result<MockBehavior> {
        self.lock()
            .units
            .get(id)
            .map(|u| u.behavior.clone())
            .ok_or_else(|| RuntimeError::Wait(format!("no such unit: {id}")))
    }

    fn set_state(&self, id: &UnitId, state: UnitState) {
        if let Some(unit) = self.lock().units.get_mut(id) {
            unit.state = state;
        }
    }

    /// Units created so far.
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    /// Units removed so far.
    pub fn removed_count(&self) -> usize {
        self.lock().removed
    }

    /// Stop calls so far.
    pub fn stopped_count(&self) -> usize {
        self.lock().stopped
    }

    /// Units still present.
    pub fn live_count(&self) -> usize {
        self.lock().units.len()
    }

    /// Configurations of every created unit, in creation order.
    pub fn configs(&self) -> Vec<UnitConfig> {
        self.lock().configs.clone()
    }

    /// Content of each unit's bind source at creation time.
    pub fn staged_sources(&self) -> Vec<Option<Vec<u8>>> {
        self.lock().staged.clone()
    }

    /// Images pulled so far.
    pub fn pulled_images(&self) -> Vec<String> {
        self.lock().pulled.clone()
    }

    /// Insert a unit without going through `create`, as if left by a crash.
    pub fn insert_orphan(&self, image: impl Into<String>) -> UnitId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = UnitId::new(format!("orphan-{}", state.next_id));
        let config = UnitConfig {
            image: image.into(),
            cmd: vec!["true".into()],
            ..Default::default()
        };
        state.units.insert(
            id.clone(),
            MockUnit {
                config,
                behavior: MockBehavior::default(),
                state: UnitState::Exited,
            },
        );
        id
    }
}

#[async_trait]
impl IsolationRuntime for MockRuntime {
    async fn create(&self, config: &UnitConfig) -> Result<UnitId> {
        config.validate()?;
        let behavior = self
            .behaviors
            .get(&config.image)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());
        if behavior.fail_create {
            return Err(RuntimeError::Create(format!(
                "mock refused image {}",
                config.image
            )));
        }

        let staged = config
            .bind
            .as_ref()
            .and_then(|b| std::fs::read(&b.source).ok());

        let mut state = self.lock();
        state.next_id += 1;
        let id = UnitId::new(format!("mock-{}", state.next_id));
        state.created += 1;
        state.configs.push(config.clone());
        state.staged.push(staged);
        state.units.insert(
            id.clone(),
            MockUnit {
                config: config.clone(),
                behavior,
                state: UnitState::Created,
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &UnitId) -> Result<()> {
        let behavior = self
            .behavior_of(id)
            .map_err(|e| RuntimeError::Start(e.to_string()))?;
        if behavior.fail_start {
            return Err(RuntimeError::Start("mock start failure".into()));
        }
        self.set_state(id, UnitState::Running);
        Ok(())
    }

    async fn wait(&self, id: &UnitId) -> Result<i64> {
        let behavior = self.behavior_of(id)?;
        if behavior.fail_wait {
            return Err(RuntimeError::Wait("mock wait failure".into()));
        }
        if behavior.hang {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(behavior.run_for).await;
        self.set_state(id, UnitState::Exited);
        Ok(behavior.exit_code)
    }

    async fn logs(&self, id: &UnitId, max_bytes: usize) -> Result<CapturedLogs> {
        let behavior = self
            .behavior_of(id)
            .map_err(|e| RuntimeError::Logs(e.to_string()))?;
        if behavior.fail_logs {
            return Err(RuntimeError::Logs("mock log failure".into()));
        }
        let mut captured = CapturedLogs::default();
        if captured.push(&behavior.stdout, max_bytes) {
            captured.push(&behavior.stderr, max_bytes);
        }
        Ok(captured)
    }

    async fn stop(&self, id: &UnitId, _grace: Duration) -> Result<()> {
        let mut state = self.lock();
        state.stopped += 1;
        if let Some(unit) = state.units.get_mut(id) {
            if !unit.state.is_finished() {
                unit.state = UnitState::Exited;
            }
        }
        Ok(())
    }

    async fn remove(&self, id: &UnitId) -> Result<()> {
        let mut state = self.lock();
        let fail = state
            .units
            .get(id)
            .map(|u| u.behavior.fail_remove)
            .unwrap_or(false);
        if fail {
            return Err(RuntimeError::Remove("mock remove failure".into()));
        }
        if state.units.remove(id).is_some() {
            state.removed += 1;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UnitSummary>> {
        let state = self.lock();
        Ok(state
            .units
            .iter()
            .filter(|(_, u)| u.config.is_managed())
            .map(|(id, u)| UnitSummary {
                id: id.clone(),
                image: u.config.image.clone(),
                state: u.state.to_string(),
                created_at: None,
            })
            .collect())
    }

    async fn pull(&self, image: &str) -> Result<()> {
        self.lock().pulled.push(image.to_string());
        Ok(())
    }
}
