//! On-disk helpers for files under a transfer root.
//!
//! Roots may be written with a leading `~`; every function here expands it
//! before touching the filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Whether a destination file exists, and its size if so.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    /// The path exists.
    pub exists: bool,
    /// Size in bytes, 0 when missing.
    pub size: u64,
}

/// Errors from file maintenance operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// Removing the file failed for a reason other than it being absent.
    #[error("failed to delete {path}: {source}")]
    Delete {
        /// The path that could not be removed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Expands a leading `~` to the home directory and makes the path absolute.
///
/// Falls back to the input unchanged when neither the home directory nor the
/// current directory can be determined.
#[must_use]
pub fn expand_root(root: &str) -> PathBuf {
    let expanded = match root.strip_prefix('~') {
        Some(rest) => match home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(root),
        },
        None => PathBuf::from(root),
    };

    if expanded.is_absolute() {
        return expanded;
    }
    std::env::current_dir().map_or(expanded.clone(), |cwd| cwd.join(&expanded))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Reports whether `<root>/<folder>/<file_name>` exists and its size.
#[must_use]
pub fn check_file_status(root: &str, folder: &str, file_name: &str) -> FileStatus {
    let path = expand_root(root).join(folder).join(file_name);
    status_of(&path)
}

pub(crate) fn status_of(path: &Path) -> FileStatus {
    match std::fs::metadata(path) {
        Ok(meta) => FileStatus {
            exists: true,
            size: meta.len(),
        },
        Err(_) => FileStatus::default(),
    }
}

/// Deletes `<root>/<folder>/<file_name>`. A file that is already gone counts
/// as deleted.
///
/// # Errors
///
/// Returns [`FileError::Delete`] when removal fails for any other reason.
#[instrument(level = "debug")]
pub fn delete_file(root: &str, folder: &str, file_name: &str) -> Result<(), FileError> {
    let path = expand_root(root).join(folder).join(file_name);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FileError::Delete { path, source }),
    }
}
