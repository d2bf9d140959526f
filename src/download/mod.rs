//! Transfer engine for streaming remote files into a root directory.
//!
//! This module provides everything between a caller's batch of
//! [`TransferRequest`]s and finished files on disk.
//!
//! # Features
//!
//! - One tokio task per transfer, optionally gated by an admission limit
//! - Fixed-size chunked streaming with per-chunk progress updates
//! - Cooperative cancellation per transfer identifier
//! - Temp-then-rename materialization (no partial file under the final name)
//! - Body-avoiding remote probes that guess a filename and size
//!
//! # Example
//!
//! ```no_run
//! use multiloader_core::download::{DownloadEngine, EngineOptions, TransferBatch, TransferRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(EngineOptions::default())?;
//! let batch = TransferBatch::new("~/models").with_request(TransferRequest::new(
//!     "vae",
//!     "https://example.com/files/vae.safetensors",
//!     "vae.safetensors",
//!     "vae",
//! ));
//! let handle = engine.start_transfers(batch)?;
//! for (id, outcome) in handle.wait().await {
//!     println!("{id}: {outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod atomic;
mod cancel;
mod client;
mod constants;
mod engine;
mod error;
mod filename;
mod probe;
mod request;

pub use atomic::AtomicFile;
pub use cancel::{CancelGuard, CancelRegistry};
pub use client::{BROWSER_USER_AGENT, HttpClient};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, MAX_PROBE_REDIRECTS, PROBE_TIMEOUT_SECS,
};
pub use engine::{BatchHandle, DownloadEngine, EngineError, EngineOptions, TransferOutcome};
pub use error::{DownloadError, ValidationError};
pub use filename::{looks_like_identifier, parse_content_disposition};
pub use probe::{ProbeResult, Prober, append_token, is_token_gated_url};
pub use request::{TransferBatch, TransferRequest};

// Note: no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
