// src/bin/sync.rs

//! `mirrorsync`: standalone reconciler + watcher CLI (§6).
//!
//! Reconciles `input_dir` into `output_dir` once, then (unless `--once`)
//! keeps the mirror live via the Write-Completion Monitor / Batch Queue
//! pipeline until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mirrorsync::batch_queue::BatchQueueConfig;
use mirrorsync::cache::SqliteHashCache;
use mirrorsync::cli::{self, CliArgs};
use mirrorsync::config::TaskConfig;
use mirrorsync::handler::log_writer::TaskLogWriter;
use mirrorsync::handler::SyncHandler;
use mirrorsync::logging;
use mirrorsync::reconciler;
use mirrorsync::watch::{NotifyWatchSource, WatchSource};
use mirrorsync::write_monitor::WriteMonitorConfig;
use tokio::sync::oneshot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_sync();
    logging::init_logging(args.effective_log_level())?;

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "mirrorsync failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: CliArgs) -> Result<()> {
    let input_dir = PathBuf::from(&args.input_dir);
    let output_dir = PathBuf::from(&args.output_dir);
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let cache = SqliteHashCache::open(output_dir.join(".db").join("file_cache.db"))
        .context("opening hash cache")?;
    let log_writer = Arc::new(TaskLogWriter::new(&output_dir));

    let task = TaskConfig::new(
        "standalone".to_string(),
        "standalone".to_string(),
        input_dir.to_string_lossy().to_string(),
        output_dir.to_string_lossy().to_string(),
        args.extension_set(),
    );

    let batch_config = BatchQueueConfig {
        batch_size: args.batch_size,
        interval: Duration::from_secs_f64(args.batch_interval),
    };

    let (handler, monitor_rx) = SyncHandler::new(
        task,
        Arc::new(cache),
        log_writer,
        WriteMonitorConfig::default(),
        batch_config,
    );

    let stats = reconciler::reconcile(&handler).await?;
    info!(?stats, "initial reconciliation complete");

    if args.once {
        return Ok(());
    }

    let watch: Box<dyn WatchSource> = Box::new(
        NotifyWatchSource::spawn(&input_dir).context("starting file watcher")?,
    );

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });

    info!(input = %input_dir.display(), output = %output_dir.display(), "watching for changes");
    handler.run_live(watch, monitor_rx, stop_rx).await;

    Ok(())
}
