//! Hit/miss accounting shared by all drivers.
//!
//! Counters are cheap atomics. A driver and every sibling produced by
//! `with_serializer` hold the same [`DriverMetrics`], so stats reflect all
//! traffic against one backend regardless of codec.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic read-path counters.
#[derive(Debug, Default)]
pub struct DriverMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit.
    pub fn record_hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        trace!("Cache HIT: {}", key);
    }

    /// Record a cache miss.
    pub fn record_miss(&self, key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("Cache MISS: {}", key);
    }

    /// Record an error that was swallowed into a miss.
    pub fn record_error(&self, key: &str, error: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        warn!("Cache ERROR for {} (treated as miss): {}", key, error);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
