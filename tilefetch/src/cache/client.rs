//! Tile cache client.
//!
//! This client wraps a byte-level `CacheStore` with:
//! - Key translation: `(source, TileId, frame)` → [`CacheKey`]
//! - Metrics injection: cache hit/miss reporting
//! - Error absorption: a failed read is a miss, a failed write is logged

use std::sync::Arc;

use tracing::warn;

use crate::cache::traits::{CacheKey, CacheStore};
use crate::coord::{FrameIndex, TileId};
use crate::source::TileSource;
use crate::telemetry::FetchMetrics;

/// Cache client used by fetch tasks.
#[derive(Clone)]
pub struct TileCacheClient {
    /// The underlying store.
    store: Arc<dyn CacheStore>,

    /// Optional metrics for hit/miss reporting.
    metrics: Option<Arc<FetchMetrics>>,
}

impl TileCacheClient {
    /// Creates a client without metrics.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Creates a client reporting hits and misses to `metrics`.
    pub fn with_metrics(store: Arc<dyn CacheStore>, metrics: Arc<FetchMetrics>) -> Self {
        Self {
            store,
            metrics: Some(metrics),
        }
    }

    /// Reads the cached bytes for one frame of a tile.
    ///
    /// Store errors are logged and reported as a miss so the caller falls
    /// through to the network.
    pub async fn get(
        &self,
        source: &TileSource,
        tile: &TileId,
        frame: FrameIndex,
    ) -> Option<Vec<u8>> {
        let key = CacheKey::for_frame(source, tile, frame);
        let result = match self.store.read(&key).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, key = %key, "Tile cache read failed");
                None
            }
        };

        if let Some(ref m) = self.metrics {
            if result.is_some() {
                m.cache_hit();
            } else {
                m.cache_miss();
            }
        }
        result
    }

    /// Stores raw bytes for one frame of a tile.
    ///
    /// Returns `false` if the write failed; the failure is already logged.
    pub async fn set(
        &self,
        source: &TileSource,
        tile: &TileId,
        frame: FrameIndex,
        data: Vec<u8>,
    ) -> bool {
        let key = CacheKey::for_frame(source, tile, frame);
        match self.store.write(&key, data).await {
            Ok(()) => {
                if let Some(ref m) = self.metrics {
                    m.cache_write();
                }
                true
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Tile cache write failed");
                false
            }
        }
    }
}
