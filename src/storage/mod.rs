//! Artifact storage on the local filesystem and, when an organization has
//! configured one, an S3-compatible object store.
//!
//! Reads try the filesystem first and fall back to the object store. Writes
//! go to the object store when it is enabled, to the filesystem otherwise.

mod cipher;
mod s3;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::stream::BoxStream;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::error::{DocumentError, Result};
use crate::models::{ObjectStoreConfig, Organization};

pub use cipher::CredentialCipher;
pub use s3::{S3Storage, S3StorageFactory};

/// Body of an object store download, read chunk by chunk.
pub type ByteChunks = BoxStream<'static, Result<Bytes>>;

/// A stored artifact, with the version assigned by the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub version_id: Option<String>,
}

/// Remote object store holding organization artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` under `key` and returns the version id, if any.
    async fn upload_file(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<Option<String>>;

    /// Returns `Ok(None)` when there is no object under `key`.
    async fn download_file(&self, key: &str) -> Result<Option<ByteChunks>>;

    /// Deletes all objects in a single request.
    async fn delete_files(&self, objects: &[StoredObject]) -> Result<()>;
}

/// Builds the object store client of an organization.
pub trait ObjectStorageFactory: Send + Sync {
    fn connect(&self, config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStorage>>;
}

/// An object store is usable only when all of its settings are present.
pub fn is_enabled(config: Option<&ObjectStoreConfig>) -> bool {
    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    config.is_some_and(|c| {
        present(&c.key_id) && present(&c.application_key) && present(&c.endpoint) && present(&c.bucket)
    })
}

/// Rejects paths that could escape the storage root.
pub fn check_path_safety(path: &str) -> Result<()> {
    if path.contains("..") {
        warn!("rejected path with parent traversal: {}", path);
        return Err(DocumentError::validation(format!("invalid path {}", path)));
    }
    if path.starts_with('/') || path.starts_with('\\') || path.contains('\0') {
        warn!("rejected absolute or malformed path: {}", path);
        return Err(DocumentError::validation(format!("invalid path {}", path)));
    }
    Ok(())
}

/// Sanitizes every segment of a `/` separated relative path.
pub fn sanitize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(sanitize_filename::sanitize)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Root folder of an organization's artifacts.
pub fn organization_folder(organization: &Organization) -> String {
    sanitize_filename::sanitize(format!("{}-{}", organization.name, organization.id))
}

/// Where a download was served from.
pub enum Download {
    Local(PathBuf),
    Remote(ByteChunks),
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => f.debug_tuple("Local").field(path).finish(),
            Self::Remote(_) => f.write_str("Remote(..)"),
        }
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    uploads_dir: PathBuf,
    remotes: Arc<dyn ObjectStorageFactory>,
}

impl DocumentStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, remotes: Arc<dyn ObjectStorageFactory>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            remotes,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Object store of `organization`, when it has a complete configuration.
    pub fn remote_for(&self, organization: &Organization) -> Result<Option<Arc<dyn ObjectStorage>>> {
        match organization.object_store() {
            Some(config) if is_enabled(Some(config)) => self.remotes.connect(config).map(Some),
            _ => Ok(None),
        }
    }

    /// Local path of `key`. Fails on traversal before touching the disk.
    pub fn local_path(&self, key: &str) -> Result<PathBuf> {
        check_path_safety(key)?;
        let relative = sanitize_path(key);
        if relative.is_empty() {
            return Err(DocumentError::validation("empty path"));
        }
        Ok(self.uploads_dir.join(relative))
    }

    pub async fn download_file(&self, key: &str, remote: Option<&dyn ObjectStorage>) -> Result<Download> {
        let path = self.local_path(key)?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                debug!("serving {} from filesystem", key);
                return Ok(Download::Local(path));
            }
            Ok(_) => debug!("{} is not a file on the filesystem", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("filesystem lookup of {} failed: {}", key, e),
        }

        let Some(remote) = remote else {
            return Err(DocumentError::not_found(format!("file {}", key)));
        };
        match remote.download_file(key).await {
            Ok(Some(chunks)) => {
                debug!("serving {} from object-store", key);
                Ok(Download::Remote(chunks))
            }
            Ok(None) => Err(DocumentError::not_found(format!("file {}", key))),
            Err(e) => {
                error!("object-store download of {} failed: {}", key, e);
                Err(e)
            }
        }
    }

    /// Stores `data` under `key`. Returns the object store version id when
    /// the object store was used.
    pub async fn upload_file(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        remote: Option<&dyn ObjectStorage>,
    ) -> Result<Option<String>> {
        let path = self.local_path(key)?;

        if let Some(remote) = remote {
            let version_id = remote.upload_file(key, data, content_type).await.map_err(|e| {
                error!("object-store upload of {} failed: {}", key, e);
                e
            })?;
            info!("uploaded {} to object-store (version {:?})", key, version_id);
            return Ok(version_id);
        }

        write_atomically(&path, data).await.map_err(|e| {
            error!("filesystem upload of {} failed: {}", key, e);
            DocumentError::storage(format!("cannot write {}: {}", key, e))
        })?;
        info!("uploaded {} to filesystem", key);
        Ok(None)
    }

    /// Removes local files right away and schedules the object store batch
    /// delete in the background. The returned handle may be ignored.
    pub fn delete_files(
        &self,
        objects: Vec<StoredObject>,
        remote: Option<Arc<dyn ObjectStorage>>,
    ) -> Option<JoinHandle<()>> {
        let objects: Vec<StoredObject> = objects
            .into_iter()
            .filter(|object| check_path_safety(&object.key).is_ok())
            .collect();

        for object in &objects {
            let Ok(path) = self.local_path(&object.key) else {
                continue;
            };
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("deleted {} from filesystem", object.key),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("cannot delete {} from filesystem: {}", object.key, e),
            }
        }

        let remote = remote?;
        if objects.is_empty() {
            return None;
        }
        Some(tokio::spawn(async move {
            match remote.delete_files(&objects).await {
                Ok(()) => info!("deleted {} object(s) from object-store", objects.len()),
                Err(e) => error!("object-store delete of {:?} failed: {}", objects, e),
            }
        }))
    }
}

async fn write_atomically(path: &Path, data: Vec<u8>) -> std::io::Result<()> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let target = path.to_path_buf();
    tokio::fs::create_dir_all(&parent).await?;
    tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new_in(&parent)?;
        file.write_all(&data)?;
        file.as_file().sync_all()?;
        file.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}
