//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// Immutable copy of the fetch counters, safe to hand to a UI or logger.
#[derive(Clone, Debug)]
pub struct TelemetrySnapshot {
    /// Time since the metrics were created
    pub uptime: Duration,

    /// Accepted `request_tile` calls
    pub requests: u64,
    /// Requests that found their frames already in flight
    pub requests_deduplicated: u64,

    /// Fetch tasks started
    pub tasks_started: u64,
    /// Fetch tasks currently running
    pub tasks_active: usize,
    /// Fetch tasks that ended canceled
    pub tasks_canceled: u64,

    /// Cache probes that found data
    pub cache_hits: u64,
    /// Cache probes that found nothing
    pub cache_misses: u64,
    /// Hit ratio in `[0, 1]`
    pub cache_hit_rate: f64,
    /// Successful cache writes
    pub cache_writes: u64,

    /// Network requests issued
    pub network_requests: u64,
    /// Body bytes received
    pub bytes_downloaded: u64,
    /// 404 responses
    pub not_found: u64,
    /// Transport failures and unexpected HTTP statuses
    pub transport_errors: u64,
    /// Payloads that failed to decode
    pub decode_errors: u64,

    /// Success callbacks delivered
    pub tiles_loaded: u64,
    /// Failure callbacks delivered
    pub tiles_failed: u64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} tasks={} (active {}, canceled {}) cache hit {:.1}% network={} \
             loaded={} failed={}",
            self.requests,
            self.tasks_started,
            self.tasks_active,
            self.tasks_canceled,
            self.cache_hit_rate * 100.0,
            self.network_requests,
            self.tiles_loaded,
            self.tiles_failed
        )
    }
}
