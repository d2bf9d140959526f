//! Temp-then-rename file writer.
//!
//! Bytes go to `<final>.tmp` and only reach the final name through a single
//! rename after the writer has been flushed. Any path that does not commit
//! (error, cancellation, drop) removes the temporary file.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::constants::TEMP_SUFFIX;
use super::error::DownloadError;

/// A file being written under a temporary name.
#[derive(Debug)]
pub struct AtomicFile {
    final_path: PathBuf,
    tmp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
    finished: bool,
}

/// `<path>.tmp`, keeping the full original filename.
pub(crate) fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(TEMP_SUFFIX);
    final_path.with_file_name(name)
}

impl AtomicFile {
    /// Creates (or truncates) the temporary file next to `final_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the temporary file cannot be created.
    pub async fn create(final_path: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let final_path = final_path.into();
        let tmp_path = temp_path_for(&final_path);
        let file = File::create(&tmp_path)
            .await
            .map_err(|e| DownloadError::io(tmp_path.clone(), e))?;
        Ok(Self {
            final_path,
            tmp_path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
            finished: false,
        })
    }

    /// Path bytes are currently written to.
    #[must_use]
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Appends `chunk` to the temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] on write failure.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), DownloadError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(DownloadError::io(
                self.tmp_path.clone(),
                std::io::Error::other("write after close"),
            ));
        };
        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(self.tmp_path.clone(), e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes, closes and renames the temporary file to its final name.
    ///
    /// An existing file at the final name is replaced. On failure the
    /// temporary file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if flushing or renaming fails.
    pub async fn commit(mut self) -> Result<u64, DownloadError> {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush().await
        {
            self.discard().await;
            return Err(DownloadError::io(self.tmp_path.clone(), e));
        }

        if let Err(e) = tokio::fs::rename(&self.tmp_path, &self.final_path).await {
            self.discard().await;
            return Err(DownloadError::io(self.final_path.clone(), e));
        }

        self.finished = true;
        debug!(
            path = %self.final_path.display(),
            bytes = self.bytes_written,
            "committed file"
        );
        Ok(self.bytes_written)
    }

    /// Closes and removes the temporary file without touching the final
    /// name.
    pub async fn abort(mut self) {
        self.discard().await;
    }

    async fn discard(&mut self) {
        // Close the handle before unlinking
        self.writer.take();
        match tokio::fs::remove_file(&self.tmp_path).await {
            Ok(()) => debug!(path = %self.tmp_path.display(), "removed temporary file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!(
                path = %self.tmp_path.display(),
                error = %e,
                "failed to remove temporary file"
            ),
        }
        self.finished = true;
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.writer.take();
        // Drop can run after the runtime is gone; the unlink must finish here
        let _ = std::fs::remove_file(&self.tmp_path);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_appends_suffix_to_full_name() {
        assert_eq!(
            temp_path_for(Path::new("/data/model.safetensors")),
            PathBuf::from("/data/model.safetensors.tmp")
        );
    }

    #[tokio::test]
    async fn test_commit_moves_bytes_to_final_name() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.bin");

        let mut file = AtomicFile::create(&target).await.unwrap();
        file.write_chunk(b"hello ").await.unwrap();
        file.write_chunk(b"world").await.unwrap();
        assert!(!target.exists());
        assert!(file.tmp_path().exists());

        let written = file.commit().await.unwrap();
        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_commit_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.bin");
        std::fs::write(&target, b"old contents").unwrap();

        let mut file = AtomicFile::create(&target).await.unwrap();
        file.write_chunk(b"new").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"old contents");

        file.commit().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_abort_removes_temp_and_leaves_no_final_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.bin");

        let mut file = AtomicFile::create(&target).await.unwrap();
        file.write_chunk(b"partial").await.unwrap();
        file.abort().await;

        assert!(!target.exists());
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_drop_without_commit_cleans_up() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out.bin");

        {
            let mut file = AtomicFile::create(&target).await.unwrap();
            file.write_chunk(b"partial").await.unwrap();
        }

        assert!(!target.exists());
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_create_fails_when_folder_is_missing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("missing").join("out.bin");
        let result = AtomicFile::create(&target).await;
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }
}
