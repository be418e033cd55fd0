//! Core traits for tile cache stores.
//!
//! The `CacheStore` trait is a byte-level key-value interface. Fetch tasks
//! probe it before going to the network and write raw tile bytes back after a
//! successful download.
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable, map directly onto relative file paths
//! - **Vec<u8> values**: Raw tile bytes as received from the network
//! - **Unbounded**: Stores never evict; size management is the host's concern
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` for trait object support

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::coord::{FrameIndex, TileId};
use crate::source::TileSource;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key cannot be mapped onto the store (e.g. escapes the cache root).
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deterministic cache key for one frame of one tile.
///
/// Format: `{namespace}/{level}/{x}/{y}_{frame}.{extension}`, where the
/// namespace comes from [`TileSource::cache_namespace`].
/// Example: `radar/5/10/12_0.png`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `(tile, frame)` served by `source`.
    pub fn for_frame(source: &TileSource, tile: &TileId, frame: FrameIndex) -> Self {
        Self(format!(
            "{}/{}/{}/{}_{}.{}",
            source.cache_namespace(),
            tile.level,
            tile.x,
            tile.y,
            frame,
            source.extension()
        ))
    }

    /// Wraps an arbitrary key string.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte-level tile cache.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and tolerate concurrent reads and
/// writes of distinct keys from many fetch tasks.
pub trait CacheStore: Send + Sync {
    /// Reads the bytes stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn read(&self, key: &CacheKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn write(&self, key: &CacheKey, value: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let source = TileSource::new("http://t/{z}/{x}/{y}", 0, 10).with_name("radar");
        let key = CacheKey::for_frame(&source, &TileId::new(5, 10, 12), 0);
        assert_eq!(key.as_str(), "radar/5/10/12_0.png");
    }

    #[test]
    fn test_cache_key_distinguishes_frames() {
        let source = TileSource::new("http://t/{z}/{x}/{y}", 0, 10).with_name("radar");
        let tile = TileId::new(2, 1, 1);
        assert_ne!(
            CacheKey::for_frame(&source, &tile, 0),
            CacheKey::for_frame(&source, &tile, 1)
        );
    }

    #[test]
    fn test_cache_key_uses_extension() {
        let source = TileSource::new("http://t/{z}/{x}/{y}", 0, 10)
            .with_name("roads")
            .with_extension("pbf");
        let key = CacheKey::for_frame(&source, &TileId::new(1, 0, 1), 3);
        assert_eq!(key.to_string(), "roads/1/0/1_3.pbf");
    }

    #[test]
    fn test_cache_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
        assert!(cache_err.to_string().contains("denied"));
    }
}
