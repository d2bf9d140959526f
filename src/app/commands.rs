//! Subcommand handlers.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use multiloader_core::{DownloadEngine, TransferOutcome, check_file_status, delete_file};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::batch::{BatchOverrides, apply_overrides, load_batch};
use super::exit_handler::{OutcomeCounts, determine_exit_outcome};
use super::progress_view::{ViewMode, spawn_progress_view};
use super::terminal;
use crate::ProcessExit;
use crate::cli::{DeleteArgs, DownloadArgs, ProbeArgs, StatusArgs};

/// Picks how live progress is shown for `download`.
pub(crate) fn view_mode(json: bool, quiet: bool) -> ViewMode {
    if json {
        ViewMode::Json
    } else if terminal::should_use_progress_bars(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    ) {
        ViewMode::Bars
    } else {
        ViewMode::Hidden
    }
}

pub(crate) async fn run_download(
    engine: &DownloadEngine,
    args: &DownloadArgs,
    mode: ViewMode,
) -> Result<ProcessExit> {
    let batch = apply_overrides(
        load_batch(&args.batch)?,
        &BatchOverrides {
            root: args.root.as_deref(),
            token: args.token.as_deref(),
            force: args.force,
            only: &args.only,
        },
    )?;

    if batch.requests.is_empty() {
        info!("Batch lists no files");
        return Ok(ProcessExit::Success);
    }
    let total = batch.requests.len();

    // Subscribe before starting so no early update is missed
    let feed = engine.subscribe_progress();
    let stop = CancellationToken::new();
    let view = spawn_progress_view(mode, feed, stop.clone());

    let handle = engine
        .start_transfers(batch)
        .context("Batch rejected before any transfer started")?;
    info!(total, "Transfers started");
    debug!(ids = ?handle.ids(), "Transfer ids");

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    let signal_engine = engine.clone();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    interrupted_signal.store(true, Ordering::SeqCst);
                    let cancelled = signal_engine.cancel_all();
                    warn!(cancelled, "Interrupted, cancelling transfers");
                }
            }
            () = signal_stop.cancelled() => {}
        }
    });

    let outcomes = handle.wait().await;
    stop.cancel();
    if let Some(view) = view {
        let _ = view.await;
    }

    for (id, outcome) in &outcomes {
        match outcome {
            TransferOutcome::Failed { message } => warn!(id = %id, error = %message, "Failed"),
            TransferOutcome::Rejected => warn!(id = %id, "Rejected: already in progress"),
            TransferOutcome::Skipped => debug!(id = %id, "Skipped: already on disk"),
            TransferOutcome::Cancelled => info!(id = %id, "Cancelled"),
            TransferOutcome::Completed { bytes } => debug!(id = %id, bytes, "Completed"),
        }
    }

    let counts = OutcomeCounts::tally(outcomes.iter().map(|(_, outcome)| outcome));
    info!(
        completed = counts.completed,
        skipped = counts.skipped,
        failed = counts.failed,
        cancelled = counts.cancelled,
        total,
        "Download complete"
    );

    Ok(determine_exit_outcome(
        counts,
        interrupted.load(Ordering::SeqCst),
    ))
}

pub(crate) async fn run_probe(engine: &DownloadEngine, args: &ProbeArgs) -> Result<ProcessExit> {
    let result = engine
        .probe_remote_file(&args.url, args.token.as_deref())
        .await;
    let rendered =
        serde_json::to_string_pretty(&result).context("Failed to encode probe result")?;
    println!("{rendered}");
    Ok(ProcessExit::Success)
}

pub(crate) fn run_status(args: &StatusArgs) -> Result<ProcessExit> {
    let batch = apply_overrides(
        load_batch(&args.batch)?,
        &BatchOverrides {
            root: args.root.as_deref(),
            ..BatchOverrides::default()
        },
    )?;

    let mut missing = 0usize;
    for request in &batch.requests {
        let status = check_file_status(&batch.root_dir, &request.folder, &request.file_name);
        if !status.exists {
            missing += 1;
        }
        println!(
            "{}\t{}\t{}\t{}",
            request.id,
            if status.exists { "present" } else { "missing" },
            status.size,
            Path::new(&request.folder)
                .join(&request.file_name)
                .display()
        );
    }
    info!(total = batch.requests.len(), missing, "Status checked");
    Ok(ProcessExit::Success)
}

pub(crate) fn run_delete(args: &DeleteArgs) -> Result<ProcessExit> {
    delete_file(&args.root, &args.folder, &args.file).context("Delete failed")?;
    info!(
        root = %args.root,
        folder = %args.folder,
        file = %args.file,
        "Deleted"
    );
    Ok(ProcessExit::Success)
}
