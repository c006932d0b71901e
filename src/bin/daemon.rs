// src/bin/daemon.rs

//! `mirrorsyncd`: task supervisor + HTTP/JSON admin surface (§4.7, §6).

use std::sync::Arc;

use anyhow::{Context, Result};
use mirrorsync::api;
use mirrorsync::cli::{self, DaemonArgs};
use mirrorsync::logging;
use mirrorsync::supervisor::{self, Supervisor};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_daemon();
    logging::init_logging(args.log_level)?;

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "mirrorsyncd failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: DaemonArgs) -> Result<()> {
    let supervisor = Arc::new(Supervisor::new(&args.state_dir).context("opening supervisor state")?);
    supervisor.bootstrap().await.context("restarting previously-running tasks")?;

    let app = api::router(Arc::clone(&supervisor));
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding admin API to {}", args.bind))?;

    info!(bind = %args.bind, state_dir = %args.state_dir, "mirrorsyncd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("admin API server failed")?;

    supervisor::shutdown_all(&supervisor).await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install Ctrl+C handler");
    }
}
