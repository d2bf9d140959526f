//! Batch document loading and command-line overrides.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use multiloader_core::TransferBatch;

/// Command-line adjustments applied on top of a loaded batch.
#[derive(Debug, Default)]
pub(crate) struct BatchOverrides<'a> {
    pub root: Option<&'a str>,
    pub token: Option<&'a str>,
    pub force: bool,
    pub only: &'a [String],
}

/// Reads a batch document from `path`.
pub(crate) fn load_batch(path: &Path) -> Result<TransferBatch> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse batch file '{}'", path.display()))
}

/// Applies `overrides` to `batch`.
///
/// Fails when `only` names an id the batch does not contain.
pub(crate) fn apply_overrides(
    mut batch: TransferBatch,
    overrides: &BatchOverrides<'_>,
) -> Result<TransferBatch> {
    if let Some(root) = overrides.root {
        batch.root_dir = root.to_string();
    }
    if let Some(token) = overrides.token {
        batch = batch.with_token_value(token);
    }
    if overrides.force {
        for request in &mut batch.requests {
            request.force = true;
        }
    }
    if !overrides.only.is_empty() {
        let known: HashSet<&str> = batch.requests.iter().map(|r| r.id.as_str()).collect();
        if let Some(missing) = overrides.only.iter().find(|id| !known.contains(id.as_str())) {
            bail!("No entry with id '{missing}' in batch");
        }
        let wanted: HashSet<&str> = overrides.only.iter().map(String::as_str).collect();
        batch.requests.retain(|r| wanted.contains(r.id.as_str()));
    }
    if batch.root_dir.trim().is_empty() {
        bail!("Batch has no root directory; set rootDirectory or pass --root");
    }
    Ok(batch)
}
