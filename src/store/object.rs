//! Object store client for promoted models

use crate::core::error::StoreError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Bucket/key storage the production model is promoted to
pub trait ObjectStore: Send + Sync {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    fn key_exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;

    /// Upload a local file to `bucket/key`, replacing any existing object
    ///
    /// Readers see either the previous object or the complete new one.
    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        remove_local: bool,
    ) -> Result<(), StoreError>;

    /// Read the object stored at `bucket/key`
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
}

fn validate_bucket(bucket: &str) -> Result<(), StoreError> {
    let pattern = Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$")
        .map_err(|e| StoreError::InvalidName(e.to_string()))?;
    if pattern.is_match(bucket) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(bucket.to_string()))
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(key.to_string()))
    }
}

/// Object store on the local filesystem: one directory per bucket
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.bucket_dir(bucket)?.is_dir())
    }

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let dir = self.bucket_dir(bucket)?;
        std::fs::create_dir_all(&dir)?;
        info!("Created bucket {}", bucket);
        Ok(())
    }

    fn key_exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        remove_local: bool,
    ) -> Result<(), StoreError> {
        if !self.bucket_exists(bucket)? {
            return Err(StoreError::NotFound {
                container: bucket.to_string(),
                name: String::new(),
            });
        }
        let target = self.object_path(bucket, key)?;
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidName(key.to_string()))?;
        std::fs::create_dir_all(parent)?;

        // Stage next to the target so the rename stays on one filesystem
        let staging = parent.join(format!(".{}.partial", Uuid::new_v4().simple()));
        if let Err(e) = std::fs::copy(local_path, &staging) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&staging, &target) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }
        debug!("Uploaded {} to {}/{}", local_path.display(), bucket, key);

        if remove_local {
            std::fs::remove_file(local_path)?;
        }
        Ok(())
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                container: bucket.to_string(),
                name: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Object store held in memory
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes directly under `bucket/key`, creating the bucket
    pub fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), bytes);
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unreachable("object store lock poisoned".to_string())
}

impl ObjectStore for InMemoryObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;
        Ok(buckets.contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_bucket(bucket)?;
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn key_exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;
        Ok(buckets.get(bucket).is_some_and(|b| b.contains_key(key)))
    }

    fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        remove_local: bool,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let bytes = std::fs::read(local_path)?;
        {
            let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
            let objects = buckets.get_mut(bucket).ok_or_else(|| StoreError::NotFound {
                container: bucket.to_string(),
                name: String::new(),
            })?;
            objects.insert(key.to_string(), bytes);
        }
        if remove_local {
            std::fs::remove_file(local_path)?;
        }
        Ok(())
    }

    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;
        buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                container: bucket.to_string(),
                name: key.to_string(),
            })
    }
}
