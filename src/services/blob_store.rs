//! src/services/blob_store.rs
//!
//! BlobStore — document payloads on local disk, one file per storage key
//! directly beneath `base_path`. Writes go to a temporary file first and are
//! renamed into place only once the whole stream fit under the size cap.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_STORAGE_KEY_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum BlobWriteError {
    #[error("payload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    /// The incoming body failed before it was fully read.
    #[error("upload stream failed: {0}")]
    Stream(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A payload that was fully written and renamed into place.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub location: PathBuf,
    pub size_bytes: u64,
}

/// Outcome of removing a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobRemoval {
    Removed,
    AlreadyAbsent,
}

#[derive(Clone, Debug)]
pub struct BlobStore {
    /// Directory holding one file per document.
    base_path: PathBuf,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path for a storage key. Does not check for existence.
    pub fn location_for(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join(format!(".tmp-{}", Uuid::new_v4()))
    }

    /// Reject keys that could escape `base_path` or are not a single
    /// path component.
    fn ensure_key_safe(key: &str) -> io::Result<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_STORAGE_KEY_LEN
            || key.starts_with('.')
            || key.contains("..")
            || key
                .chars()
                .any(|c| c.is_ascii_control() || c == '/' || c == '\\');
        if invalid {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid storage key `{key}`"),
            ));
        }
        Ok(())
    }

    /// Stream bytes into the blob for `key`, aborting once more than `limit`
    /// bytes arrive.
    ///
    /// The partial temp file is removed on every failure path, so after an
    /// error nothing exists under `key`.
    pub async fn write_capped<S>(
        &self,
        key: &str,
        stream: S,
        limit: u64,
    ) -> Result<StoredBlob, BlobWriteError>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        Self::ensure_key_safe(key)?;
        fs::create_dir_all(&self.base_path).await?;

        let location = self.location_for(key);
        let tmp_path = self.temp_path();
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    remove_quietly(&tmp_path).await;
                    return Err(BlobWriteError::Stream(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if size_bytes > limit {
                drop(file);
                remove_quietly(&tmp_path).await;
                return Err(BlobWriteError::TooLarge { limit });
            }
            if let Err(err) = file.write_all(&chunk).await {
                remove_quietly(&tmp_path).await;
                return Err(BlobWriteError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            remove_quietly(&tmp_path).await;
            return Err(BlobWriteError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            remove_quietly(&tmp_path).await;
            return Err(BlobWriteError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &location).await {
            remove_quietly(&tmp_path).await;
            return Err(BlobWriteError::Io(err));
        }

        debug!(path = %location.display(), size_bytes, "stored blob");
        Ok(StoredBlob {
            location,
            size_bytes,
        })
    }

    /// Write, read back and remove a marker file in `base_path`.
    pub async fn probe(&self) -> io::Result<()> {
        const MARKER: &[u8] = b"readyz";

        let tmp_path = self.temp_path();
        fs::write(&tmp_path, MARKER).await?;
        let read_back = fs::read(&tmp_path).await;
        remove_quietly(&tmp_path).await;

        if read_back? != MARKER {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            ));
        }
        Ok(())
    }

    /// Open a blob for reading, returning the handle and its length.
    ///
    /// A missing file surfaces as `ErrorKind::NotFound`.
    pub async fn open(&self, location: &Path) -> io::Result<(File, u64)> {
        let file = File::open(location).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove a blob. A blob that is already gone is not an error.
    pub async fn delete(&self, location: &Path) -> io::Result<BlobRemoval> {
        match fs::remove_file(location).await {
            Ok(()) => {
                debug!(path = %location.display(), "removed blob");
                Ok(BlobRemoval::Removed)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %location.display(), "blob already missing");
                Ok(BlobRemoval::AlreadyAbsent)
            }
            Err(err) => Err(err),
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            debug!("failed to remove temp file {}: {}", path.display(), err);
        }
    }
}
