//! HTTP transport.
//!
//! ## Endpoints
//!
//! - `GET /` - Greeting
//! - `GET /health` - Health check
//! - `GET /api/` - Authenticated liveness check
//! - `GET /api/list` - Runner catalogue
//! - `POST /api/run` - Run a submission

use crate::auth::require_basic_auth;
use crate::error::ApiError;
use crate::types::{RunCodeRequest, RunCodeResponse};
use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use coderun_core::{ExecutionRequest, Executor};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state of the router.
#[derive(Clone)]
pub struct AppState {
    executor: Executor,
    clients: Arc<HashMap<String, String>>,
}

impl AppState {
    pub fn new(executor: Executor, clients: HashMap<String, String>) -> Self {
        Self {
            executor,
            clients: Arc::new(clients),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn clients(&self) -> &HashMap<String, String> {
        &self.clients
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    tracing::debug!("Building HTTP router");

    let api = Router::new()
        .route("/api", get(api_root_handler))
        .route("/api/", get(api_root_handler))
        .route("/api/list", get(list_handler))
        .route("/api/run", post(run_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::debug!("HTTP router built with routes: /, /health, /api/, /api/list, /api/run");
    router
}

async fn root_handler() -> &'static str {
    "Hello, World 👋!"
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "coderun-api"
    }))
}

async fn api_root_handler() -> &'static str {
    "It works!"
}

async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.executor.registry().catalogue().clone())
}

/// Run a submission.
///
/// The execution runs on its own task so that teardown always completes. If
/// the client goes away this handler is dropped, which drops `cancel_tx` and
/// ends the wait early.
async fn run_handler(
    State(state): State<AppState>,
    Json(payload): Json<RunCodeRequest>,
) -> Result<Json<RunCodeResponse>, ApiError> {
    let request = ExecutionRequest::from(payload);
    let executor = state.executor.clone();
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let cancel = async move {
            let _ = cancel_rx.await;
        };
        executor.execute_until(&request, cancel).await
    });

    let joined = task.await;
    drop(cancel_tx);

    let result = joined.map_err(|e| {
        tracing::error!(error = %e, "Execution task failed");
        ApiError::ExecutionFailed
    })?;
    let result = result.map_err(|e| {
        if !e.is_unknown_runner() {
            tracing::warn!(error = %e, "Run request failed");
        }
        ApiError::from(e)
    })?;

    Ok(Json(RunCodeResponse::from(&result)))
}

/// Start the HTTP server.
///
/// Runs until `shutdown` resolves, then drains in-flight requests.
pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(state);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
