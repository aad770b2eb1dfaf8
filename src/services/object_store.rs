//! Object storage collaborator: put/get ciphertext blobs by key.
//!
//! The backend is swappable behind [`ObjectStore`]; the service never assumes
//! a specific provider. The default backend stores blobs on local disk,
//! sharded beneath `base_path/{shard}/{shard}/{key}` to keep per-directory
//! file counts bounded.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Blob storage boundary.
///
/// `put` must be an idempotent overwrite: re-uploading an existing key fully
/// replaces the previous content and is safe to retry. The returned locator
/// is an opaque retrieval reference surfaced to clients; reads go through
/// `get` by key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
}

/// Local-disk object store.
#[derive(Clone, Debug)]
pub struct DiskObjectStore {
    base_path: PathBuf,
}

impl DiskObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Two-level shard identifiers for a key: first two bytes of MD5(key) as
    /// lowercase hex.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    /// Write bytes to a temporary file, fsync, then atomically rename into
    /// place so a crash never leaves a half-written blob under the final key.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<String, ObjectStoreError> {
        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(PathBuf::from)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let write_result = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }

        debug!(
            key,
            content_type = content_type.unwrap_or("application/octet-stream"),
            size = bytes.len(),
            "stored blob at {}",
            file_path.display()
        );

        Ok(format!("file://{}", file_path.display()))
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let file_path = self.object_path(key);
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
