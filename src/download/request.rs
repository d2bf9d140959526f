//! Transfer requests as supplied by the configuration collaborator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::filename::{is_contained_folder, is_plain_file_name};
use crate::files::expand_root;

/// One file to fetch into `<root>/<folder>/<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Caller-assigned identifier; the key for progress and cancellation.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Target filename inside `folder`.
    pub file_name: String,
    /// Target folder relative to the batch root.
    #[serde(default)]
    pub folder: String,
    /// Append the batch token to the URL as a `token` query parameter.
    #[serde(default)]
    pub use_token: bool,
    /// Re-download even when the destination already exists.
    #[serde(default)]
    pub force: bool,
}

impl TransferRequest {
    /// Creates a request with `use_token` and `force` disabled.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        file_name: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            file_name: file_name.into(),
            folder: folder.into(),
            use_token: false,
            force: false,
        }
    }

    /// Sets the force-redownload flag.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the append-token flag.
    #[must_use]
    pub fn with_token(mut self, use_token: bool) -> Self {
        self.use_token = use_token;
        self
    }

    /// Final on-disk path of this request under an already expanded `root`.
    #[must_use]
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(&self.folder).join(&self.file_name)
    }

    /// Checks the fields that can be judged without touching disk or network.
    ///
    /// The identifier itself is checked at batch level.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl {
                id: self.id.clone(),
            });
        }
        if !is_plain_file_name(&self.file_name) {
            return Err(ValidationError::InvalidFileName {
                id: self.id.clone(),
                file_name: self.file_name.clone(),
            });
        }
        if !is_contained_folder(&self.folder) {
            return Err(ValidationError::FolderOutsideRoot {
                id: self.id.clone(),
                folder: self.folder.clone(),
            });
        }
        Ok(())
    }
}

/// A set of requests sharing one root directory and one optional token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBatch {
    /// Root directory; a leading `~` is expanded to the home directory.
    #[serde(default, alias = "rootDirectory")]
    pub root_dir: String,
    /// Token appended to URLs of requests with `use_token` set.
    #[serde(default, alias = "civitaiToken")]
    pub token: Option<String>,
    /// The files to fetch.
    #[serde(default, alias = "files")]
    pub requests: Vec<TransferRequest>,
}

impl TransferBatch {
    /// Creates an empty batch rooted at `root_dir`.
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            token: None,
            requests: Vec::new(),
        }
    }

    /// Sets the batch token. Blank tokens count as absent.
    #[must_use]
    pub fn with_token_value(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Adds one request.
    #[must_use]
    pub fn with_request(mut self, request: TransferRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Root directory with `~` expanded.
    #[must_use]
    pub fn resolved_root(&self) -> PathBuf {
        expand_root(&self.root_dir)
    }

    /// Rejects batches whose identifiers cannot be tracked: an empty id, or
    /// the same id twice.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] or [`ValidationError::DuplicateId`].
    pub fn validate_ids(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for (index, request) in self.requests.iter().enumerate() {
            if request.id.trim().is_empty() {
                return Err(ValidationError::EmptyId { index });
            }
            if !seen.insert(request.id.as_str()) {
                return Err(ValidationError::DuplicateId {
                    id: request.id.clone(),
                });
            }
        }
        Ok(())
    }
}
