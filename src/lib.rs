//! speedsite -- a self-hosted Wi-Fi speed test page.
//!
//! Each test runs an external measurement provider under a hard wall-clock
//! deadline, and completed results go into a bounded in-memory history that
//! the browser UI can chart, clear, and export as CSV or JSON.

pub mod api;
pub mod config;
pub mod executor;
pub mod history;
pub mod measurement;
pub mod report;

use anyhow::{Context, Result};

/// Start the HTTP server and block until Ctrl-C.
pub async fn serve(cfg: config::Config) -> Result<()> {
    cfg.validate()?;

    let state = api::state::AppState::from_config(&cfg)?;
    let provider = state.executor.provider();
    let meta = provider.meta();
    if !measurement::check_installed(provider).await {
        tracing::warn!(
            provider = meta.id,
            hint = meta.install_hint,
            "measurement provider not installed; tests will fail until it is"
        );
    }

    let app = api::router(state);

    let addr: std::net::SocketAddr = cfg.server.bind.parse()?;
    tracing::info!(
        %addr,
        provider = %cfg.measurement.provider,
        deadline_secs = cfg.measurement.deadline_secs,
        history_capacity = cfg.history.capacity,
        "speedsite listening"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("speedsite stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
