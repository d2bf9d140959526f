//! Error types for the download module.
//!
//! This module defines structured errors for transfer execution and batch
//! validation, providing context-rich messages that end up verbatim in a
//! transfer's `errorMessage`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while executing a single transfer.
///
/// URLs carried here are always the caller's original URL, never the
/// token-bearing request URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the configured transfer or connect timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with something other than 200 OK.
    #[error("bad status: HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error (directory creation, temp file write, rename).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Problems with a transfer request detected before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Request at `index` has no identifier, so it cannot be tracked.
    #[error("request #{index} has an empty id")]
    EmptyId {
        /// Position of the request in its batch.
        index: usize,
    },

    /// Two requests in one batch share an identifier.
    #[error("duplicate id '{id}' in batch")]
    DuplicateId {
        /// The repeated identifier.
        id: String,
    },

    /// Request has no source URL.
    #[error("transfer '{id}' has an empty url")]
    EmptyUrl {
        /// Identifier of the offending request.
        id: String,
    },

    /// Target filename is empty or would escape its folder.
    #[error("transfer '{id}' has an invalid file name '{file_name}'")]
    InvalidFileName {
        /// Identifier of the offending request.
        id: String,
        /// The rejected file name.
        file_name: String,
    },

    /// Target folder is absolute or climbs out of the root.
    #[error("transfer '{id}' has a folder outside the root: '{folder}'")]
    FolderOutsideRoot {
        /// Identifier of the offending request.
        id: String,
        /// The rejected folder.
        folder: String,
    },
}

// Note on From trait implementations:
// We do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because every variant needs context (url, path) the source errors lack.
// Use the helper constructors instead.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.bin", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.starts_with("bad status"), "Expected prefix in: {msg}");
        assert!(
            msg.contains("https://example.com/file.bin"),
            "Expected URL in: {msg}"
        );
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/model.bin.tmp"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/model.bin.tmp"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::Timeout {
            url: "https://example.com/slow".to_string(),
        };
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_validation_error_names_the_offending_transfer() {
        let error = ValidationError::FolderOutsideRoot {
            id: "lora-1".to_string(),
            folder: "../etc".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("lora-1"));
        assert!(msg.contains("../etc"));
    }
}
