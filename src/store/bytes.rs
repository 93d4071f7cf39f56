//! Staged byte content for local file records.

use crate::error::Result;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Directory-backed store of staged file bytes, one file per record.
///
/// Chunks are appended in the order they arrive; no sequence numbers are
/// tracked, so ordering is entirely the caller's responsibility.
pub struct ByteStore {
    dir: PathBuf,
}

impl ByteStore {
    /// Open the byte store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Path of the byte file backing a record.
    #[must_use]
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Create the (empty) byte file for a freshly staged record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub async fn create_empty(&self, id: Uuid) -> Result<PathBuf> {
        let path = self.path_for(id);
        tokio::fs::File::create(&path).await?;
        Ok(path)
    }

    /// Append a chunk to the end of a record's byte file.
    ///
    /// Returns the total size in bytes after the append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub async fn append(&self, id: Uuid, chunk: &Bytes) -> Result<u64> {
        let path = self.path_for(id);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await?;
        file.write_all(chunk).await?;
        file.flush().await?;

        let size = file.metadata().await?.len();
        debug!("Appended {} bytes to {id} (total {size})", chunk.len());
        Ok(size)
    }

    /// Read the full staged content of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn read(&self, id: Uuid) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(id)).await?)
    }

    /// Returns true if a byte file exists for the record.
    pub async fn exists(&self, id: Uuid) -> bool {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .unwrap_or(false)
    }

    /// Remove a record's byte file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        tokio::fs::remove_file(self.path_for(id)).await?;
        Ok(())
    }
}
