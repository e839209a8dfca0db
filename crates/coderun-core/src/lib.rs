//! # coderun-core
//!
//! Execution orchestration for coderun sandboxes.
//!
//! Each submission is written to a fresh staging file, bind-mounted into a
//! throwaway unit, run under a deadline, and collected. The unit is stopped and
//! removed, and the staging file deleted, on every path.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   coderun-core (host)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Executor     │────▶│  RunnerRegistry          │   │
//! │  │  - execute()    │     │  (id → RunnerSpec)       │   │
//! │  │  - reap_orphans │     └──────────────────────────┘   │
//! │  └─────────────────┘                                    │
//! │           │              ┌──────────────────────────┐   │
//! │           ├─────────────▶│  Stager → StagedSource   │   │
//! │           ▼              └──────────────────────────┘   │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │  UnitLifecycle  │────▶│  await_exit (deadline)   │   │
//! │  │  - run()        │     └──────────────────────────┘   │
//! │  └─────────────────┘                                    │
//! │           │                                              │
//! └───────────┼──────────────────────────────────────────────┘
//!             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │         IsolationRuntime (coderun-docker / bollard)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use coderun_core::{ExecutionRequest, Executor, ExecutorConfig, RunnerRegistry, Stager};
//! use coderun_docker::DockerRuntime;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Executor::new(
//!     Arc::new(RunnerRegistry::builtin()),
//!     Arc::new(DockerRuntime::connect()?),
//!     Stager::local("data/temp"),
//!     ExecutorConfig::default(),
//! )?;
//!
//! let result = executor
//!     .execute(&ExecutionRequest::new("python-3", "print('hello')"))
//!     .await?;
//! println!("{} {}", result.status_flag(), result.output_lossy());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod executor;
mod lifecycle;
mod registry;
mod report;
mod stager;
mod supervisor;

pub use config::{
    ExecutorConfig, ExecutorConfigBuilder, DEFAULT_EXEC_TIMEOUT, DEFAULT_MAX_OUTPUT_BYTES,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{CoreError, Result};
pub use executor::{ExecutionRequest, Executor};
pub use lifecycle::{UnitLifecycle, RUNNER_LABEL};
pub use registry::{ResourceLimit, RunnerRegistry, RunnerSpec};
pub use report::ExecutionResult;
pub use stager::{StagedSource, Stager};
pub use supervisor::{await_exit, WaitOutcome};
