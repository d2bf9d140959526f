//! Progress snapshot types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a transfer. Every state but `Downloading` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Bytes are (or are about to be) flowing.
    Downloading,
    /// The final file is in place.
    Completed,
    /// The transfer failed; see `error_message`.
    Error,
    /// The transfer was cancelled by the user.
    Cancelled,
}

impl TransferStatus {
    /// True for `Completed`, `Error` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Downloading)
    }

    /// Stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Transfer identifier.
    pub id: String,
    /// Target filename.
    pub file_name: String,
    /// Expected size; `None` while unknown. `Some(0)` is a real empty file.
    pub total_bytes: Option<u64>,
    /// Bytes written so far.
    pub downloaded_bytes: u64,
    /// 0-100, only meaningful when `total_bytes` is known.
    pub percent: f64,
    /// Average bytes per second since the transfer started.
    pub throughput_bytes_per_second: f64,
    /// Current lifecycle state.
    pub status: TransferStatus,
    /// Failure description, present only when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Progress {
    /// A fresh `Downloading` record with nothing transferred yet.
    pub fn started(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            total_bytes: None,
            downloaded_bytes: 0,
            percent: 0.0,
            throughput_bytes_per_second: 0.0,
            status: TransferStatus::Downloading,
            error_message: None,
        }
    }

    /// Records `downloaded` bytes after `elapsed_secs`, recomputing percent
    /// and throughput.
    ///
    /// `downloaded` never moves backwards.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_bytes(&mut self, downloaded: u64, elapsed_secs: f64) {
        self.downloaded_bytes = self.downloaded_bytes.max(downloaded);
        if let Some(total) = self.total_bytes.filter(|total| *total > 0) {
            self.percent = (self.downloaded_bytes as f64 / total as f64 * 100.0).min(100.0);
        }
        if elapsed_secs > 0.0 {
            self.throughput_bytes_per_second = self.downloaded_bytes as f64 / elapsed_secs;
        }
    }

    /// Moves to `Completed` with `percent` forced to 100.
    pub fn complete(&mut self, downloaded: u64) {
        self.downloaded_bytes = self.downloaded_bytes.max(downloaded);
        self.percent = 100.0;
        self.status = TransferStatus::Completed;
    }

    /// Moves to `Error` with `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TransferStatus::Error;
        self.error_message = Some(message.into());
    }

    /// Moves to `Cancelled`.
    pub fn cancel(&mut self) {
        self.status = TransferStatus::Cancelled;
    }
}
