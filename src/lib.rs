//! Multiloader Core Library
//!
//! This library provides the core functionality for the multiloader tool,
//! which fetches batches of independent files into a shared root directory
//! while reporting live progress to any number of observers.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Transfer orchestration, remote probing, atomic file writes
//! - [`progress`] - Progress snapshots, the progress store, and the broadcast hub
//! - [`files`] - On-disk status checks and deletion under a root directory

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod files;
pub mod progress;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{
    BatchHandle, DEFAULT_CHUNK_SIZE, DownloadEngine, DownloadError, EngineError, EngineOptions,
    HttpClient, ProbeResult, Prober, TransferBatch, TransferOutcome, TransferRequest,
    ValidationError, is_token_gated_url,
};
pub use files::{FileError, FileStatus, check_file_status, delete_file, expand_root};
pub use progress::{
    BroadcastHub, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SUBSCRIBER_CAPACITY, Progress,
    ProgressEvent, ProgressFeed, ProgressStore, Subscription, TransferStatus,
};
