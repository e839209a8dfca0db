//! # coderun-api
//!
//! HTTP server for coderun sandboxes.
//!
//! Clients authenticate with HTTP basic auth and submit source code with a
//! runner identifier; each submission runs in a fresh, network-less container
//! that is removed before the response is sent.
//!
//! ```text
//! POST /api/run  {"container": "golang-latest", "code": "..."}
//!             →  {"code": 1, "out": "hello world!"}
//! ```
//!
//! `code` in the response is `1` when the program exited 0 and `0` otherwise.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use http::{build_router, serve, AppState};
pub use types::{RunCodeRequest, RunCodeResponse};
