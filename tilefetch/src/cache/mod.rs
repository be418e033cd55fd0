//! Tile cache stores.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  TileCacheClient    │   (source, TileId, frame) → CacheKey
//! │                     │   hit/miss metrics, error absorption
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────┐
//! │              Arc<dyn CacheStore>                │
//! │                                                 │
//! │  DiskCacheStore      one file per key           │
//! │  MemoryCacheStore    moka, unbounded            │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilefetch::cache::{DiskCacheStore, TileCacheClient};
//!
//! let client = TileCacheClient::new(Arc::new(DiskCacheStore::new("/var/cache/tiles")));
//! if let Some(bytes) = client.get(&source, &tile, 0).await {
//!     // Cache hit
//! }
//! ```

mod client;
mod disk;
mod memory;
mod traits;

pub use client::TileCacheClient;
pub use disk::DiskCacheStore;
pub use memory::MemoryCacheStore;
pub use traits::{BoxFuture, CacheError, CacheKey, CacheStore};
