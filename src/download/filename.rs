//! Filename extraction, sanitization, and heuristics for remote files.
//!
//! This module provides utilities for deriving safe filenames from
//! Content-Disposition headers and URL paths, and for spotting names that
//! are really opaque numeric identifiers.

use std::path::{Component, Path};

use tracing::debug;
use url::Url;

/// Parses a Content-Disposition header value to extract the filename.
///
/// Handles:
/// - `attachment; filename="example.zip"`
/// - `attachment; filename=example.zip`
/// - `attachment; filename*=UTF-8''example%20file.zip` (RFC 5987, preferred)
///
/// Parameter names are matched case-insensitively.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let params: Vec<(String, &str)> = header
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
        .collect();

    // filename*= wins when both forms are present
    if let Some((_, value)) = params.iter().find(|(name, _)| name == "filename*") {
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        // Format: charset'language'encoded_value
        let encoded = match value.find("''") {
            Some(quote_pos) => &value[quote_pos + 2..],
            None => value,
        };
        let decoded = urlencoding::decode(encoded)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| encoded.to_string());
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }

    params
        .iter()
        .find(|(name, _)| name == "filename")
        .map(|(_, value)| value.trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|name| !name.is_empty())
}

/// Returns true when `name` is just digits once a trailing extension is removed.
///
/// Such names (`123456`, `98765.zip`) come from API or shortener endpoints
/// that hide the human filename, so probing keeps looking for a better one.
#[must_use]
pub fn looks_like_identifier(name: &str) -> bool {
    let stem = match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit())
}

/// Last path segment of `url`, percent-decoded. Empty when the path has none.
pub(crate) fn filename_from_url(url: &str) -> String {
    let last = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => {
            // Unparseable: cut at the query and take what follows the last slash
            let without_query = url.split(['?', '#']).next().unwrap_or_default();
            without_query
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        }
    };

    urlencoding::decode(&last).map_or_else(
        |e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.clone()
        },
        std::borrow::Cow::into_owned,
    )
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return String::new();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// True when `name` is a single plain path segment (no separators, no `.`/`..`).
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && is_safe_filename_segment(name)
        && Path::new(name).components().count() == 1
}

/// True when `folder` stays under its root (relative, no `..`).
pub(crate) fn is_contained_folder(folder: &str) -> bool {
    Path::new(folder).components().all(|component| {
        matches!(component, Component::Normal(_) | Component::CurDir)
    })
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
