//! Constants for the download module (timeouts, chunking, probing).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Timeout applied to each probe request (15 seconds).
pub const PROBE_TIMEOUT_SECS: u64 = 15;

/// Redirect hops a probe follows before that attempt is abandoned.
pub const MAX_PROBE_REDIRECTS: usize = 10;

/// Bytes read from the response body per chunk (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Suffix appended to the final path while a transfer is in flight.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Query parameter carrying the caller-supplied token.
pub(crate) const TOKEN_QUERY_PARAM: &str = "token";

/// Hosts that expect the token as a query parameter on probe requests.
pub(crate) const TOKEN_GATED_HOSTS: &[&str] = &["civitai.com"];
