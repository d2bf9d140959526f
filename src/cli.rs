//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Fetch batches of files into a root directory with live progress.
///
/// Batches are JSON documents listing files by id, URL, target filename
/// and folder. Transfers run concurrently and can be interrupted with Ctrl-C;
/// nothing partial is ever left under a final filename.
#[derive(Parser, Debug)]
#[command(name = "multiloader")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Settings file (defaults to ~/.config/multiloader/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every file listed in a batch document
    Download(DownloadArgs),
    /// Guess the real filename and size of a URL without downloading it
    Probe(ProbeArgs),
    /// Show which files of a batch already exist on disk
    Status(StatusArgs),
    /// Delete one file under a root directory
    Delete(DeleteArgs),
}

/// Arguments for `download`.
#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// Batch document (JSON)
    pub batch: PathBuf,

    /// Override the batch root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,

    /// Override the batch token
    #[arg(long)]
    pub token: Option<String>,

    /// Re-download files that already exist
    #[arg(short, long)]
    pub force: bool,

    /// Only download the entries with these ids (repeatable)
    #[arg(long = "only", value_name = "ID")]
    pub only: Vec<String>,

    /// Print progress events as JSON lines on stdout instead of bars
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `probe`.
#[derive(ClapArgs, Debug)]
pub struct ProbeArgs {
    /// URL to probe
    pub url: String,

    /// Token for token-gated hosts
    #[arg(long)]
    pub token: Option<String>,
}

/// Arguments for `status`.
#[derive(ClapArgs, Debug)]
pub struct StatusArgs {
    /// Batch document (JSON)
    pub batch: PathBuf,

    /// Override the batch root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<String>,
}

/// Arguments for `delete`.
#[derive(ClapArgs, Debug)]
pub struct DeleteArgs {
    /// Root directory
    #[arg(long, value_name = "DIR")]
    pub root: String,

    /// Folder under the root
    #[arg(long, default_value = "")]
    pub folder: String,

    /// File name inside the folder
    #[arg(long)]
    pub file: String,
}
