//! Cache Statistics Module
//!
//! Tracks process-lifetime hit and miss counts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Hit Counter ==
/// Lock-free hit/miss counters shared by all reader threads.
#[derive(Debug, Default)]
pub struct HitCounter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    // == Reset ==
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

// == Cache Statistics ==
/// Point-in-time statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatistics {
    /// Number of reads served from cache
    pub hits: u64,
    /// Number of reads that fell through to the caller
    pub misses: u64,
    /// Entries currently persisted
    pub total_entries: usize,
    /// Payload bytes currently persisted
    pub total_bytes: u64,
}

impl CacheStatistics {
    // == Hit Ratio ==
    /// Calculates the cache hit ratio.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(counter: &HitCounter) -> CacheStatistics {
        CacheStatistics {
            hits: counter.hits(),
            misses: counter.misses(),
            ..CacheStatistics::default()
        }
    }

    #[test]
    fn test_counter_new() {
        let counter = HitCounter::new();
        assert_eq!(counter.hits(), 0);
        assert_eq!(counter.misses(), 0);
    }

    #[test]
    fn test_hit_ratio_no_requests() {
        assert_eq!(CacheStatistics::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio_all_hits() {
        let counter = HitCounter::new();
        counter.record_hit();
        counter.record_hit();
        counter.record_hit();
        assert_eq!(snapshot(&counter).hit_ratio(), 1.0);
    }

    #[test]
    fn test_hit_ratio_all_misses() {
        let counter = HitCounter::new();
        counter.record_miss();
        counter.record_miss();
        assert_eq!(snapshot(&counter).hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio_mixed() {
        let counter = HitCounter::new();
        counter.record_hit();
        counter.record_miss();
        assert_eq!(snapshot(&counter).hit_ratio(), 0.5);
    }

    #[test]
    fn test_reset() {
        let counter = HitCounter::new();
        counter.record_hit();
        counter.record_miss();
        counter.reset();
        assert_eq!(snapshot(&counter), CacheStatistics::default());
    }

    #[test]
    fn test_concurrent_counting() {
        let counter = std::sync::Arc::new(HitCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.record_hit();
                        counter.record_miss();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.hits(), 8000);
        assert_eq!(counter.misses(), 8000);
    }
}
