//! On-disk cache store.
//!
//! Keys map onto relative paths under a root directory. The directory grows
//! without bound; nothing is ever evicted.
//!
//! Writes go to a uniquely named temporary file that is renamed into place,
//! so a concurrent reader never observes a partially written tile.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::traits::{BoxFuture, CacheError, CacheKey, CacheStore};

/// Cache store writing one file per key under a root directory.
pub struct DiskCacheStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl DiskCacheStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_counter: AtomicU64::new(0),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path, rejecting keys that would escape the root.
    pub fn path_for(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        let relative = Path::new(key.as_str());
        let valid = !key.as_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = path
            .file_name()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        path.with_file_name(name)
    }
}

impl CacheStore for DiskCacheStore {
    fn read(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            let path = path?;
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(CacheError::Io(e)),
            }
        })
    }

    fn write(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            let path = path?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let temp = self.temp_path(&path);
            if let Err(e) = tokio::fs::write(&temp, &value).await {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(CacheError::Io(e));
            }
            if let Err(e) = tokio::fs::rename(&temp, &path).await {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(CacheError::Io(e));
            }
            Ok(())
        })
    }
}
