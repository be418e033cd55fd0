//! In-memory cache store using moka.
//!
//! Moka's lock-free reads and non-blocking inserts make it safe to share
//! between many fetch tasks on the tokio runtime. The store is built without
//! a capacity, so entries are never evicted.

use moka::future::Cache as MokaCache;

use crate::cache::traits::{BoxFuture, CacheError, CacheKey, CacheStore};

/// Unbounded in-memory cache store.
#[derive(Clone)]
pub struct MemoryCacheStore {
    cache: MokaCache<String, Vec<u8>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            cache: MokaCache::builder().build(),
        }
    }

    /// Number of entries currently stored.
    ///
    /// Moka counts lazily; call after [`MemoryCacheStore::sync`] for an exact value.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance so counters are up to date.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let key = key.as_str().to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn write(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        let key = key.as_str().to_string();
        Box::pin(async move {
            self.cache.insert(key, value).await;
            Ok(())
        })
    }
}
