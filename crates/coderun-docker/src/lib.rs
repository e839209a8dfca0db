//! # coderun-docker
//!
//! Isolated unit management layer for coderun.
//! Provides a narrow abstraction over the Docker Engine API (via bollard)
//! for throwaway, resource-bounded containers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use coderun_docker::{DockerRuntime, IsolationRuntime, UnitBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> coderun_docker::Result<()> {
//! let runtime = DockerRuntime::connect()?;
//!
//! let config = UnitBuilder::new()
//!     .image("python:3-alpine")
//!     .cmd(["python3", "/runner/main.py"])
//!     .bind("/srv/coderun/temp/3f2a", "/runner/main.py")
//!     .limits(50_000_000, 64 * 1024 * 1024)
//!     .build_config()?;
//!
//! let id = runtime.create(&config).await?;
//! runtime.start(&id).await?;
//! let exit_code = runtime.wait(&id).await?;
//! let logs = runtime.logs(&id, 1024 * 1024).await?;
//! println!("{exit_code}: {}", String::from_utf8_lossy(&logs.output));
//!
//! // Cleanup
//! runtime.stop(&id, Duration::ZERO).await?;
//! runtime.remove(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Lifecycle Management**: Create, start, wait, stop and force-remove units
//! - **Isolation**: No network, single bind mount, optional CPU and memory ceilings
//! - **Ownership Labels**: Every unit is labelled so orphans can be listed and reaped
//! - **Testing**: `MockRuntime` behind the `mock` feature

mod builder;
mod config;
mod docker;
mod error;
mod runtime;
mod unit;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use builder::UnitBuilder;
pub use config::{BindMount, UnitConfig, UnitLimits, MANAGED_LABEL};
pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};
pub use runtime::{CapturedLogs, IsolationRuntime, TRUNCATION_MARKER};
pub use unit::{UnitId, UnitState, UnitSummary};
