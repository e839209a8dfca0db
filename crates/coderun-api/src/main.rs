//! coderun HTTP server entry point.

use coderun_api::{http, AppState, ServerConfig};
use coderun_core::Executor;
use coderun_docker::DockerRuntime;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("coderun_api=info,coderun_core=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting coderun server");

    let config = ServerConfig::from_env()?;
    config.validate()?;
    config.validate_warn();
    tracing::info!(
        http_addr = %config.http_addr,
        limit = config.limit,
        exec_timeout_secs = config.exec_timeout_secs,
        clients = config.clients.len(),
        "Configuration loaded"
    );

    let runtime = DockerRuntime::connect()?;
    runtime.ping().await?;
    tracing::info!("Connected to Docker");

    let registry = config.registry()?;
    tracing::info!(runners = registry.len(), "Runner registry ready");

    let executor = Executor::new(
        Arc::new(registry),
        Arc::new(runtime),
        config.stager()?,
        config.executor_config(),
    )?;

    // Units left behind by a previous crash.
    match executor.reap_orphans().await {
        Ok(0) => {}
        Ok(n) => tracing::info!(reaped = n, "Removed orphaned units"),
        Err(e) => tracing::warn!(error = %e, "Failed to reap orphaned units"),
    }

    if config.pull_images {
        let failed = executor.prepare_images().await;
        if !failed.is_empty() {
            tracing::warn!(failed = failed.len(), "Some runner images could not be pulled");
        }
    }

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received shutdown signal, draining requests...");
    };

    let state = AppState::new(executor.clone(), config.clients.clone());
    http::serve(state, config.http_addr, shutdown).await?;

    match executor.reap_orphans().await {
        Ok(0) => {}
        Ok(n) => tracing::info!(reaped = n, "Removed leftover units"),
        Err(e) => tracing::warn!(error = %e, "Failed to reap units on shutdown"),
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
