//! Remote metadata probing.
//!
//! Guesses a file's real name and size without downloading its body:
//!
//! 1. `HEAD`, accepting a Content-Disposition name that is not a bare number
//! 2. `GET` with `Range: bytes=0-0`, same acceptance rule
//! 3. The last segment of the URL path
//!
//! Every failure along the way is logged at debug level and treated as "no
//! information", so probing never errors.

use std::time::Duration;

use reqwest::header::{CONTENT_DISPOSITION, RANGE};
use reqwest::{Client, Method, StatusCode, redirect};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::client::{BROWSER_USER_AGENT, content_length, content_range_total};
use super::constants::{
    MAX_PROBE_REDIRECTS, PROBE_TIMEOUT_SECS, TOKEN_GATED_HOSTS, TOKEN_QUERY_PARAM,
};
use super::filename::{
    filename_from_url, looks_like_identifier, parse_content_disposition, sanitize_filename,
};

/// Best guess at a remote file's name and size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Suggested filename, sanitized for the local filesystem.
    pub file_name: String,
    /// Size in bytes when any probe reported one.
    pub size: Option<u64>,
}

/// What a single probe request revealed.
#[derive(Debug, Default)]
struct Attempt {
    file_name: Option<String>,
    size: Option<u64>,
}

impl Attempt {
    /// Name worth returning: present and not just a numeric id.
    fn accepted_name(&self) -> Option<&str> {
        self.file_name
            .as_deref()
            .filter(|name| !looks_like_identifier(name))
    }
}

/// True when `url` points at a host that takes the token as a query
/// parameter (`civitai.com` and its subdomains).
#[must_use]
pub fn is_token_gated_url(url: &str) -> bool {
    let Some(host) = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    TOKEN_GATED_HOSTS
        .iter()
        .any(|gated| host == *gated || host.ends_with(&format!(".{gated}")))
}

/// Sets the `token` query parameter on `url`, replacing any existing one.
///
/// Unparseable URLs get `?token=` or `&token=` appended verbatim.
#[must_use]
pub fn append_token(url: &str, token: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        let separator = if url.contains('?') { '&' } else { '?' };
        return format!("{url}{separator}{TOKEN_QUERY_PARAM}={token}");
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(TOKEN_QUERY_PARAM, token);
    parsed.to_string()
}

/// Issues probe requests with a browser User-Agent and bounded redirects.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    /// Creates a prober with the default 15 second per-request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
    }

    /// Creates a prober with a custom per-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_PROBE_REDIRECTS))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("failed to build probe client with static configuration");
        Self { client }
    }

    /// Guesses the filename and size of `url`.
    ///
    /// `token` is appended only for token-gated hosts.
    #[instrument(skip(self, token), fields(url = %url))]
    pub async fn probe(&self, url: &str, token: Option<&str>) -> ProbeResult {
        let request_url = match token.filter(|t| !t.is_empty()) {
            Some(token) if is_token_gated_url(url) => append_token(url, token),
            _ => url.to_string(),
        };

        let head = self.attempt(Method::HEAD, &request_url).await;
        if let Some(name) = head.accepted_name() {
            debug!(file_name = name, "probe resolved from HEAD");
            return ProbeResult {
                file_name: name.to_string(),
                size: head.size,
            };
        }

        let ranged = self.attempt(Method::GET, &request_url).await;
        if let Some(name) = ranged.accepted_name() {
            debug!(file_name = name, "probe resolved from range request");
            return ProbeResult {
                file_name: name.to_string(),
                size: ranged.size,
            };
        }

        let file_name = sanitize_filename(&filename_from_url(url));
        debug!(file_name = %file_name, "probe fell back to URL path");
        ProbeResult {
            file_name,
            size: ranged.size.or(head.size),
        }
    }

    async fn attempt(&self, method: Method, request_url: &str) -> Attempt {
        let mut request = self.client.request(method.clone(), request_url);
        if method == Method::GET {
            request = request.header(RANGE, "bytes=0-0");
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(method = %method, error = %e, "probe request failed");
                return Attempt::default();
            }
        };

        let size = if response.status() == StatusCode::PARTIAL_CONTENT {
            content_range_total(&response).or_else(|| content_length(&response))
        } else {
            content_length(&response).or_else(|| content_range_total(&response))
        };

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition)
            .map(|name| sanitize_filename(&name))
            .filter(|name| !name.is_empty());

        debug!(
            method = %method,
            status = response.status().as_u16(),
            file_name = ?file_name,
            size = ?size,
            "probe response"
        );

        // Dropping the response abandons any body the server sent anyway
        Attempt { file_name, size }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_is_token_gated_url() {
        assert!(is_token_gated_url("https://civitai.com/api/download/models/1"));
        assert!(is_token_gated_url("https://CDN.Civitai.com/x"));
        assert!(!is_token_gated_url("https://huggingface.co/x"));
        assert!(!is_token_gated_url("https://notcivitai.com/x"));
        assert!(!is_token_gated_url("not a url"));
    }

    #[test]
    fn test_append_token_adds_and_replaces() {
        assert_eq!(
            append_token("https://civitai.com/api/download/models/1", "abc"),
            "https://civitai.com/api/download/models/1?token=abc"
        );
        assert_eq!(
            append_token("https://civitai.com/d?type=Model&token=old", "new"),
            "https://civitai.com/d?type=Model&token=new"
        );
    }

    #[test]
    fn test_append_token_to_unparseable_url() {
        assert_eq!(append_token("relative/path", "t"), "relative/path?token=t");
        assert_eq!(append_token("relative?a=1", "t"), "relative?a=1&token=t");
    }

    #[tokio::test]
    async fn test_probe_uses_head_content_disposition() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                "attachment; filename=\"model.safetensors\"",
            ))
            .mount(&mock_server)
            .await;

        let url = format!("{}/download", mock_server.uri());
        let result = Prober::new().probe(&url, None).await;
        assert_eq!(result.file_name, "model.safetensors");
    }

    #[tokio::test]
    async fn test_probe_skips_numeric_head_name_for_range_name() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/models/5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"123456.bin\""),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/5"))
            .and(header("Range", "bytes=0-0"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header(
                        "Content-Disposition",
                        "attachment; filename*=UTF-8''caf%C3%A9.zip",
                    )
                    .insert_header("Content-Range", "bytes 0-0/4096")
                    .set_body_bytes(b"x"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/models/5", mock_server.uri());
        let result = Prober::new().probe(&url, None).await;
        assert_eq!(result.file_name, "café.zip");
        assert_eq!(result.size, Some(4096));
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_url_segment_with_range_size() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/123456"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/123456"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-0/12345")
                    .set_body_bytes(b"x"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/123456", mock_server.uri());
        let result = Prober::new().probe(&url, None).await;
        assert_eq!(result.file_name, "123456");
        assert_eq!(result.size, Some(12345));
    }

    #[tokio::test]
    async fn test_probe_sends_token_only_to_gated_hosts() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .and(path("/file.bin"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                "attachment; filename=\"leaked.bin\"",
            ))
            .mount(&mock_server)
            .await;

        // The mock host is not token-gated, so the token must not be sent
        let url = format!("{}/file.bin", mock_server.uri());
        let result = Prober::new().probe(&url, Some("secret")).await;
        assert_eq!(result.file_name, "file.bin");
    }

    #[tokio::test]
    async fn test_probe_unreachable_host_falls_back() {
        let prober = Prober::with_timeout(Duration::from_secs(2));
        let result = prober
            .probe("http://127.0.0.1:9/files/archive%20v2.zip", None)
            .await;
        assert_eq!(result.file_name, "archive v2.zip");
        assert_eq!(result.size, None);
    }
}
