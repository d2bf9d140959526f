//! CLI entry point for the multiloader tool.

use anyhow::{Context, Result};
use clap::Parser;
use multiloader_core::DownloadEngine;
use tracing::{debug, info};

mod app;
mod cli;

use app::{commands, settings, terminal};
use cli::{Args, Command};

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything requested succeeded (or was already on disk).
    Success,
    /// Some transfers succeeded and some did not.
    Partial,
    /// Nothing succeeded, or the run was interrupted.
    Failure,
}

impl ProcessExit {
    fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let no_color = terminal::should_disable_color(
        args.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(
        terminal::default_log_level(args.quiet, args.verbose),
        no_color,
    );
    debug!(?args, "CLI arguments parsed");

    let settings = settings::load_settings(args.config.as_deref())?;
    debug!(?settings, "Settings loaded");

    let outcome = match &args.command {
        Command::Download(download) => {
            let engine = DownloadEngine::new(settings.engine_options())
                .context("Invalid engine settings")?;
            let mode = commands::view_mode(download.json, args.quiet);
            info!("Multiloader starting");
            commands::run_download(&engine, download, mode).await?
        }
        Command::Probe(probe) => {
            let engine = DownloadEngine::new(settings.engine_options())
                .context("Invalid engine settings")?;
            commands::run_probe(&engine, probe).await?
        }
        Command::Status(status) => commands::run_status(status)?,
        Command::Delete(delete) => commands::run_delete(delete)?,
    };

    if outcome != ProcessExit::Success {
        std::process::exit(outcome.code());
    }
    Ok(())
}
