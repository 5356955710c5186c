//! Name-addressed blob storage
//!
//! Stores one file per blob name directly under the blobs directory. Files
//! hold whatever bytes the caller hands over (the service stores cipher
//! envelopes, never plaintext).
//!
//! There is no per-name locking. In [`WriteMode::Direct`] an upload truncates
//! the file and then writes into it, so a concurrent reader can observe an
//! empty file; `get` reports that as [`StoreError::Busy`] instead of returning
//! a zero-length blob. A partially written, non-empty file is not detected.
//! [`WriteMode::Staged`] writes into the staging directory and renames the
//! finished file into place, which closes that window.

use crate::config::WriteMode;
use crate::error::StoreError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Blob storage manager
#[derive(Debug)]
pub struct BlobStore {
    /// Directory holding one file per blob
    root_dir: PathBuf,
    /// Staging directory, set only in staged write mode
    staging_dir: Option<PathBuf>,
}

impl BlobStore {
    /// Create a new blob store at the given directory (direct write mode)
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self, StoreError> {
        let root_dir = root_dir.as_ref().to_path_buf();

        // Ensure directory exists
        fs::create_dir_all(&root_dir).await?;

        info!(path = %root_dir.display(), "Initialized blob store");

        Ok(Self {
            root_dir,
            staging_dir: None,
        })
    }

    /// Create a blob store using the given write mode.
    ///
    /// `staging_dir` is only used for [`WriteMode::Staged`]. It must live on
    /// the same filesystem as `root_dir` for the final rename to be atomic.
    pub async fn open<P: AsRef<Path>, S: AsRef<Path>>(
        root_dir: P,
        staging_dir: S,
        mode: WriteMode,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(root_dir).await?;

        if mode == WriteMode::Staged {
            let staging_dir = staging_dir.as_ref().to_path_buf();
            fs::create_dir_all(&staging_dir).await?;
            info!(path = %staging_dir.display(), "Staged writes enabled");
            store.staging_dir = Some(staging_dir);
        }

        Ok(store)
    }

    /// Root directory of the store
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Write mode in effect
    pub fn write_mode(&self) -> WriteMode {
        if self.staging_dir.is_some() {
            WriteMode::Staged
        } else {
            WriteMode::Direct
        }
    }

    /// Get path for a blob by name
    fn blob_path(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    /// Store bytes under `name`, replacing any previous content
    pub async fn put(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let blob_path = self.blob_path(name);

        match &self.staging_dir {
            None => {
                let mut file = fs::File::create(&blob_path).await?;
                file.write_all(data).await?;
                file.flush().await?;
            }
            Some(staging_dir) => {
                let staged = staging_dir.join(format!("{}.{}", name, uuid::Uuid::new_v4()));
                if let Err(e) = Self::write_staged(&staged, &blob_path, data).await {
                    fs::remove_file(&staged).await.ok();
                    return Err(e);
                }
            }
        }

        debug!(name = %name, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn write_staged(staged: &Path, target: &Path, data: &[u8]) -> Result<(), StoreError> {
        let mut file = fs::File::create(staged).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(staged, target).await?;
        Ok(())
    }

    /// Check if a blob exists
    pub async fn exists(&self, name: &str) -> bool {
        fs::metadata(self.blob_path(name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Get stored size (without loading data)
    pub async fn size(&self, name: &str) -> Result<u64, StoreError> {
        match fs::metadata(self.blob_path(name)).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(StoreError::NotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Retrieve a blob by name
    pub async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        if !self.exists(name).await {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let content = match fs::read(self.blob_path(name)).await {
            Ok(content) => content,
            // Removed by a concurrent clear between the check and the read
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if content.is_empty() {
            return Err(StoreError::Busy(name.to_string()));
        }

        Ok(content)
    }

    /// Delete every stored blob, keeping the directory itself.
    ///
    /// Returns the number of blobs removed.
    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        let removed = Self::clear_dir(&self.root_dir).await?;

        if let Some(staging_dir) = &self.staging_dir {
            let leftovers = Self::clear_dir(staging_dir).await?;
            if leftovers > 0 {
                warn!(count = leftovers, "Removed leftover staged files");
            }
        }

        info!(count = removed, "Cleared blob store");
        Ok(removed)
    }

    async fn clear_dir(dir: &Path) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }

    /// Get storage statistics
    pub async fn stats(&self) -> Result<StorageStats, StoreError> {
        let mut total_blobs = 0u64;
        let mut total_bytes = 0u64;

        let mut entries = fs::read_dir(&self.root_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(metadata) = entry.metadata().await {
                if metadata.is_file() {
                    total_blobs += 1;
                    total_bytes += metadata.len();
                }
            }
        }

        Ok(StorageStats {
            total_blobs,
            total_bytes,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub total_blobs: u64,
    pub total_bytes: u64,
}
