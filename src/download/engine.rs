//! Download engine driving independent transfers with live progress.
//!
//! This module provides the `DownloadEngine`, which starts one Tokio task
//! per [`TransferRequest`], streams each body into a temporary file in
//! fixed-size chunks, and records progress after every chunk.
//!
//! # Overview
//!
//! The engine owns the three pieces of shared state a transfer touches:
//! the [`ProgressStore`] (which publishes to its [`BroadcastHub`]), the
//! [`CancelRegistry`], and an optional admission semaphore. All of them are
//! injected or created here; nothing is global.
//!
//! # Example
//!
//! ```no_run
//! use multiloader_core::download::{DownloadEngine, EngineOptions, TransferBatch, TransferRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(EngineOptions::default())?;
//! let mut feed = engine.subscribe_progress();
//! let handle = engine.start_transfers(
//!     TransferBatch::new("./models")
//!         .with_request(TransferRequest::new("a", "https://example.com/a.bin", "a.bin", "")),
//! )?;
//! tokio::spawn(async move {
//!     while let Some(event) = feed.next().await {
//!         println!("{event:?}");
//!     }
//! });
//! let outcomes = handle.wait().await;
//! println!("{outcomes:?}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;
use tokio::io::AsyncReadExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::atomic::AtomicFile;
use super::cancel::CancelRegistry;
use super::client::content_length;
use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, PROBE_TIMEOUT_SECS};
use super::probe::{ProbeResult, Prober, append_token};
use super::request::{TransferBatch, TransferRequest};
use super::{DownloadError, HttpClient, ValidationError};
use crate::files::{self, FileStatus};
use crate::progress::{
    BroadcastHub, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SUBSCRIBER_CAPACITY, Progress,
    ProgressFeed, ProgressStore,
};

/// Minimum allowed admission limit.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed admission limit.
const MAX_CONCURRENCY: usize = 100;

/// Largest accepted chunk size (4 MiB).
const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid admission limit provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Invalid chunk size provided.
    #[error("invalid chunk size {value}: must be between 1 and {MAX_CHUNK_SIZE} bytes")]
    InvalidChunkSize {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Tunables for a [`DownloadEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Bytes read per chunk; progress is recorded after each one.
    pub chunk_size: usize,
    /// TCP/TLS connect timeout for transfers.
    pub connect_timeout: Duration,
    /// Deadline for a whole transfer. `None` means unbounded.
    pub transfer_timeout: Option<Duration>,
    /// Per-request timeout for probes.
    pub probe_timeout: Duration,
    /// Transfers allowed to stream at once. `None` means unlimited.
    pub max_concurrent_transfers: Option<usize>,
    /// Queue capacity of each progress subscriber.
    pub subscriber_capacity: usize,
    /// Idle time before a progress feed emits a heartbeat.
    pub heartbeat_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            transfer_timeout: None,
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
            max_concurrent_transfers: None,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl EngineOptions {
    fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(EngineError::InvalidChunkSize {
                value: self.chunk_size,
            });
        }
        if let Some(limit) = self.max_concurrent_transfers
            && !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&limit)
        {
            return Err(EngineError::InvalidConcurrency { value: limit });
        }
        Ok(())
    }
}

/// How one transfer execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The destination already existed and `force` was not set.
    Skipped,
    /// Another execution already holds this identifier.
    Rejected,
    /// The file is in place.
    Completed {
        /// Bytes written.
        bytes: u64,
    },
    /// The transfer failed; `message` is also the record's error message.
    Failed {
        /// Failure description.
        message: String,
    },
    /// The transfer was cancelled.
    Cancelled,
}

/// Why a streaming execution stopped early.
#[derive(Debug)]
enum Interrupted {
    Cancelled,
    Failed(DownloadError),
}

impl From<DownloadError> for Interrupted {
    fn from(error: DownloadError) -> Self {
        Self::Failed(error)
    }
}

/// Download engine for concurrent, independently cancellable transfers.
///
/// # Concurrency Model
///
/// - Each transfer runs in its own Tokio task
/// - With an admission limit, a semaphore permit is held while streaming
/// - Permits and identifier claims are released automatically (RAII)
/// - Progress updates for one transfer reach observers in program order
///
/// Cloning is cheap and shares all state.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
    prober: Prober,
    store: Arc<ProgressStore>,
    cancels: Arc<CancelRegistry>,
    limiter: Option<Arc<Semaphore>>,
    chunk_size: usize,
    heartbeat_interval: Duration,
}

impl DownloadEngine {
    /// Creates an engine with fresh progress and cancellation state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the chunk size or admission limit is out
    /// of range.
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        let store = Arc::new(ProgressStore::new(BroadcastHub::with_capacity(
            options.subscriber_capacity,
        )));
        Self::with_parts(options, store, Arc::new(CancelRegistry::new()))
    }

    /// Creates an engine around caller-owned progress and cancellation
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the chunk size or admission limit is out
    /// of range.
    #[instrument(level = "debug", skip(store, cancels))]
    pub fn with_parts(
        options: EngineOptions,
        store: Arc<ProgressStore>,
        cancels: Arc<CancelRegistry>,
    ) -> Result<Self, EngineError> {
        options.validate()?;
        Ok(Self {
            client: HttpClient::with_timeouts(options.connect_timeout, options.transfer_timeout),
            prober: Prober::with_timeout(options.probe_timeout),
            store,
            cancels,
            limiter: options
                .max_concurrent_transfers
                .map(|limit| Arc::new(Semaphore::new(limit))),
            chunk_size: options.chunk_size,
            heartbeat_interval: options.heartbeat_interval,
        })
    }

    /// The progress store this engine records into.
    #[must_use]
    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    /// Starts one task per request in `batch` and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] and starts nothing if any request has an
    /// empty identifier or two requests share one.
    #[instrument(skip(self, batch), fields(root = %batch.root_dir, count = batch.requests.len()))]
    pub fn start_transfers(&self, batch: TransferBatch) -> Result<BatchHandle, ValidationError> {
        batch.validate_ids()?;

        let root = batch.resolved_root();
        let token = batch.token.filter(|t| !t.trim().is_empty());
        info!(root = %root.display(), "starting batch");

        let mut ids = Vec::with_capacity(batch.requests.len());
        let mut handles = Vec::with_capacity(batch.requests.len());
        for request in batch.requests {
            ids.push(request.id.clone());
            let engine = self.clone();
            let root = root.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                engine.run_transfer(request, &root, token.as_deref()).await
            }));
        }

        Ok(BatchHandle { ids, handles })
    }

    /// Runs one transfer to a terminal state.
    ///
    /// `root` must already be expanded. `token` is appended only when the
    /// request sets `use_token`.
    #[instrument(skip(self, request, root, token), fields(transfer = %request.id, url = %request.url))]
    pub async fn run_transfer(
        &self,
        request: TransferRequest,
        root: &Path,
        token: Option<&str>,
    ) -> TransferOutcome {
        if let Err(invalid) = request.validate() {
            let Some(_guard) = self.cancels.claim(&request.id) else {
                warn!("identifier already in flight, request rejected");
                return TransferOutcome::Rejected;
            };
            let message = invalid.to_string();
            warn!(error = %message, "invalid transfer request");
            self.store
                .register(Progress::started(&request.id, &request.file_name));
            self.store.mutate(&request.id, |p| p.fail(message.clone()));
            return TransferOutcome::Failed { message };
        }

        let destination = request.destination(root);
        if !request.force && files::status_of(&destination).exists {
            debug!(path = %destination.display(), "destination exists, skipping");
            return TransferOutcome::Skipped;
        }

        let Some(guard) = self.cancels.claim(&request.id) else {
            warn!("identifier already in flight, request rejected");
            return TransferOutcome::Rejected;
        };
        self.store
            .register(Progress::started(&request.id, &request.file_name));

        let started = Instant::now();
        let result = self
            .execute(&request, &destination, token, guard.token(), started)
            .await;

        let outcome = match result {
            Ok(bytes) => {
                self.store.mutate(&request.id, |p| p.complete(bytes));
                info!(
                    path = %destination.display(),
                    bytes,
                    elapsed = ?started.elapsed(),
                    "transfer completed"
                );
                TransferOutcome::Completed { bytes }
            }
            Err(Interrupted::Cancelled) => {
                self.store.mutate(&request.id, Progress::cancel);
                info!("transfer cancelled");
                TransferOutcome::Cancelled
            }
            Err(Interrupted::Failed(error)) => {
                let message = error.to_string();
                self.store.mutate(&request.id, |p| p.fail(message.clone()));
                warn!(error = %message, "transfer failed");
                TransferOutcome::Failed { message }
            }
        };
        // The id is released only once its record is terminal
        drop(guard);
        outcome
    }

    async fn execute(
        &self,
        request: &TransferRequest,
        destination: &Path,
        token: Option<&str>,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<u64, Interrupted> {
        let _permit = self.admit(cancel).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let request_url = match token {
            Some(token) if request.use_token => append_token(&request.url, token),
            _ => request.url.clone(),
        };

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Interrupted::Cancelled),
            response = self.client.get(&request_url, &request.url) => response?,
        };

        let total = content_length(&response);
        self.store.mutate(&request.id, |p| p.total_bytes = total);
        debug!(total = ?total, "streaming body");

        let mut file = AtomicFile::create(destination).await?;
        let body = response.bytes_stream().map_err(io::Error::other);
        let mut reader = std::pin::pin!(StreamReader::new(body));
        let mut buffer = vec![0u8; self.chunk_size];
        let mut downloaded: u64 = 0;

        loop {
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    file.abort().await;
                    return Err(Interrupted::Cancelled);
                }
                read = reader.read(&mut buffer) => read,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    let error = body_error(&request.url, file.tmp_path(), e);
                    file.abort().await;
                    return Err(error.into());
                }
            };

            if let Err(error) = file.write_chunk(&buffer[..n]).await {
                file.abort().await;
                return Err(error.into());
            }
            downloaded += n as u64;

            let elapsed = started.elapsed().as_secs_f64();
            self.store
                .mutate(&request.id, |p| p.record_bytes(downloaded, elapsed));
        }

        Ok(file.commit().await?)
    }

    /// Waits for an admission permit when a limit is configured.
    async fn admit(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<OwnedSemaphorePermit>, Interrupted> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupted::Cancelled),
            permit = Arc::clone(limiter).acquire_owned() => match permit {
                Ok(permit) => Ok(Some(permit)),
                // The semaphore is never closed while the engine is alive
                Err(_) => Err(Interrupted::Cancelled),
            },
        }
    }

    /// Signals the transfer holding `id` to stop. Returns `false` if none
    /// does.
    pub fn cancel_transfer(&self, id: &str) -> bool {
        self.cancels.cancel(id)
    }

    /// Signals every in-flight transfer. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        self.cancels.cancel_all()
    }

    /// Latest snapshot for `id`.
    #[must_use]
    pub fn get_progress(&self, id: &str) -> Option<Progress> {
        self.store.get(id)
    }

    /// Latest snapshot of every transfer this engine has seen.
    #[must_use]
    pub fn get_all_progress(&self) -> HashMap<String, Progress> {
        self.store.get_all()
    }

    /// Opens a live progress feed.
    #[must_use]
    pub fn subscribe_progress(&self) -> ProgressFeed {
        ProgressFeed::new(self.store.hub().subscribe(), self.heartbeat_interval)
    }

    /// Guesses the remote filename and size of `url`.
    pub async fn probe_remote_file(&self, url: &str, token: Option<&str>) -> ProbeResult {
        self.prober.probe(url, token).await
    }

    /// Reports whether `<root>/<folder>/<file_name>` exists and its size.
    #[must_use]
    pub fn check_file_status(&self, root: &str, folder: &str, file_name: &str) -> FileStatus {
        files::check_file_status(root, folder, file_name)
    }
}

/// Maps a body read failure back to the transport error when there is one.
fn body_error(url: &str, tmp_path: &Path, error: io::Error) -> DownloadError {
    let path: PathBuf = tmp_path.to_path_buf();
    match error.into_inner() {
        Some(inner) => match inner.downcast::<reqwest::Error>() {
            Ok(reqwest_error) => DownloadError::network(url, *reqwest_error),
            Err(other) => DownloadError::io(path, io::Error::other(other)),
        },
        None => DownloadError::io(path, io::Error::other("body read failed")),
    }
}

/// Handles to the tasks of one started batch.
///
/// Dropping the handle detaches the tasks; they keep running.
#[derive(Debug)]
pub struct BatchHandle {
    ids: Vec<String>,
    handles: Vec<JoinHandle<TransferOutcome>>,
}

impl BatchHandle {
    /// Identifiers of the started transfers, in batch order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Waits for every transfer and returns `(id, outcome)` in batch order.
    pub async fn wait(self) -> Vec<(String, TransferOutcome)> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.ids.into_iter().zip(self.handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(transfer = %id, error = %e, "transfer task panicked");
                    TransferOutcome::Failed {
                        message: format!("transfer task failed: {e}"),
                    }
                }
            };
            outcomes.push((id, outcome));
        }
        outcomes
    }
}
