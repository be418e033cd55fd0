//! Lock-free atomic metrics collection.
//!
//! Uses `AtomicU64` and `AtomicUsize` for thread-safe counters updated from
//! fetch tasks running on arbitrary runtime workers.

use super::TelemetrySnapshot;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Counters for the fetch orchestrator.
///
/// All operations use `Relaxed` ordering: counters are independent
/// measurements and nothing synchronises on them.
pub struct FetchMetrics {
    /// When metrics collection started
    start_time: Instant,

    // === Request metrics ===
    /// Accepted `request_tile` calls
    requests: AtomicU64,
    /// Requests for frames already in flight (fetch deduplicated)
    requests_deduplicated: AtomicU64,

    // === Task metrics ===
    /// Fetch tasks started
    tasks_started: AtomicU64,
    /// Fetch tasks currently running
    tasks_active: AtomicUsize,
    /// Tasks that ended canceled
    tasks_canceled: AtomicU64,

    // === Cache metrics ===
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_writes: AtomicU64,

    // === Network metrics ===
    network_requests: AtomicU64,
    bytes_downloaded: AtomicU64,
    not_found: AtomicU64,
    transport_errors: AtomicU64,
    decode_errors: AtomicU64,

    // === Delivery metrics ===
    /// Success callbacks posted to the consumer
    tiles_loaded: AtomicU64,
    /// Failure callbacks posted to the consumer
    tiles_failed: AtomicU64,
}

impl FetchMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            requests: AtomicU64::new(0),
            requests_deduplicated: AtomicU64::new(0),
            tasks_started: AtomicU64::new(0),
            tasks_active: AtomicUsize::new(0),
            tasks_canceled: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            network_requests: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            tiles_loaded: AtomicU64::new(0),
            tiles_failed: AtomicU64::new(0),
        }
    }

    pub fn request_accepted(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_deduplicated(&self) {
        self.requests_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        self.tasks_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task leaving the runtime, whatever its outcome.
    pub fn task_finished(&self) {
        // Saturating decrement; never wraps below zero
        let _ = self
            .tasks_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn task_canceled(&self) {
        self.tasks_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn network_request(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_downloaded(&self, bytes: usize) {
        self.bytes_downloaded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_loaded(&self) {
        self.tiles_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;

        TelemetrySnapshot {
            uptime: self.start_time.elapsed(),
            requests: self.requests.load(Ordering::Relaxed),
            requests_deduplicated: self.requests_deduplicated.load(Ordering::Relaxed),
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_active: self.tasks_active.load(Ordering::Relaxed),
            tasks_canceled: self.tasks_canceled.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate: if lookups > 0 {
                cache_hits as f64 / lookups as f64
            } else {
                0.0
            },
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            tiles_loaded: self.tiles_loaded.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let snapshot = FetchMetrics::new().snapshot();
        assert_eq!(snapshot.requests, 0);
        assert_eq!(snapshot.tasks_active, 0);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }

    #[test]
    fn test_task_lifecycle_counters() {
        let metrics = FetchMetrics::new();
        metrics.task_started();
        metrics.task_started();
        metrics.task_finished();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_started, 2);
        assert_eq!(snapshot.tasks_active, 1);
    }

    #[test]
    fn test_task_finished_does_not_underflow() {
        let metrics = FetchMetrics::new();
        metrics.task_finished();
        assert_eq!(metrics.snapshot().tasks_active, 0);
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = FetchMetrics::new();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 1);
        assert!((snapshot.cache_hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bytes_downloaded_accumulates() {
        let metrics = FetchMetrics::new();
        metrics.bytes_downloaded(1000);
        metrics.bytes_downloaded(24);
        assert_eq!(metrics.snapshot().bytes_downloaded, 1024);
    }
}
