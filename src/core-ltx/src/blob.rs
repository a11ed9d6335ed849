//! Path-addressed blob storage for raw pages, processed pages and artifacts.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Error;
use crate::diff::fingerprint;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `content` at `path`, replacing whatever was there.
    async fn put(&self, path: &str, content: &str) -> Result<(), Error>;

    /// Stores `content` at `path` only if nothing is there yet. Returns whether it wrote.
    async fn put_if_absent(&self, path: &str, content: &str) -> Result<bool, Error>;

    /// Reads the blob at `path`. Missing blobs are [`Error::BlobNotFound`].
    async fn get(&self, path: &str) -> Result<String, Error>;
}

/// Stable short key for a URL, safe to use as a file name.
pub fn url_key(url: &str) -> String {
    fingerprint(url)[..16].to_string()
}

pub fn raw_path(hostname: &str, job_id: Uuid, url: &str) -> String {
    format!("raw/{}/{}/{}.md", hostname, job_id, url_key(url))
}

pub fn processed_path(hostname: &str, job_id: Uuid, url: &str) -> String {
    format!("processed/{}/{}/{}.md", hostname, job_id, url_key(url))
}

/// `artifacts/{hostname}/{YYYY-MM-DD}/{job_id}/{file_name}`
pub fn artifact_path(hostname: &str, date: DateTime<Utc>, job_id: Uuid, file_name: &str) -> String {
    format!(
        "artifacts/{}/{}/{}/{}",
        hostname,
        date.format("%Y-%m-%d"),
        job_id,
        file_name
    )
}

/// Blobs as files under a root directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses OBJECT_STORE_ROOT, defaulting to `./data`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("OBJECT_STORE_ROOT").unwrap_or_else(|_| "./data".to_string()))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("blob path must be relative and stay under the store root: '{}'", path),
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, content: &str) -> Result<(), Error> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // readers never observe a partially written blob
        let tmp = target.with_extension(format!("tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &target).await?;
        tracing::debug!("Wrote blob {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, content: &str) -> Result<bool, Error> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // hard_link refuses an existing target, so the first complete write wins
        let tmp = target.with_extension(format!("tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, content).await?;
        let linked = tokio::fs::hard_link(&tmp, &target).await;
        tokio::fs::remove_file(&tmp).await?;
        match linked {
            Ok(()) => {
                tracing::debug!("Wrote blob {} ({} bytes)", path, content.len());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, path: &str) -> Result<String, Error> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(String::from_utf8(bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::BlobNotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blobs, for tests and one-off runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.blobs().remove(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, content: &str) -> Result<(), Error> {
        self.blobs().insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, content: &str) -> Result<bool, Error> {
        match self.blobs().entry(path.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(content.to_string());
                Ok(true)
            }
        }
    }

    async fn get(&self, path: &str) -> Result<String, Error> {
        self.blobs()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(path.to_string()))
    }
}
