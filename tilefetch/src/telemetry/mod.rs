//! Fetch telemetry for observability.
//!
//! Lock-free counters updated by fetch tasks and the result dispatcher.
//!
//! ```text
//! Fetch tasks / dispatcher ─────► FetchMetrics ─────► TelemetrySnapshot
//!                                 (atomic counters)   (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use tilefetch::telemetry::FetchMetrics;
//!
//! let metrics = FetchMetrics::new();
//! metrics.cache_hit();
//! metrics.tile_loaded();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.cache_hits, 1);
//! assert_eq!(snapshot.tiles_loaded, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::FetchMetrics;
pub use snapshot::TelemetrySnapshot;
