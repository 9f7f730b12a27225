//! Memory Tier Module
//!
//! Bounded in-process LRU mirror of hot entries from the persistent tier.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use linked_hash_map::LinkedHashMap;

use crate::cache::Payload;

// == Hot Entry ==
/// A decoded entry held in memory. Carries its own expiration so readers can
/// re-check it before trusting the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HotEntry {
    pub payload: Payload,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl HotEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// == Memory Tier ==
/// LRU map guarded by a single mutex.
///
/// Front of the map = least recently used, back = most recently used.
///
/// Every invalidation bumps a generation counter under the same lock. A
/// reader captures the generation before it reads the persistent tier and
/// promotes with [`MemoryTier::put_if_current`], so a row read before an
/// invalidation can never be mirrored after it.
#[derive(Debug)]
pub struct MemoryTier {
    state: Mutex<HotSet>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct HotSet {
    entries: LinkedHashMap<String, Arc<HotEntry>>,
    generation: u64,
}

impl HotSet {
    fn insert(&mut self, key: String, entry: Arc<HotEntry>, capacity: usize) -> Option<String> {
        self.entries.remove(&key);
        self.entries.insert(key, entry);

        if self.entries.len() > capacity {
            self.entries.pop_front().map(|(evicted, _)| evicted)
        } else {
            None
        }
    }

    fn remove_where(&mut self, predicate: impl Fn(&HotEntry) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.entries.remove(key);
        }
        doomed.len()
    }
}

impl MemoryTier {
    // == Constructor ==
    /// Creates a tier holding at most `capacity` entries. A capacity of zero
    /// disables the tier: every put is dropped and every get misses.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HotSet::default()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HotSet> {
        // Poisoning is ignored; entries are immutable Arcs
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // == Get ==
    /// Returns the entry and marks it most recently used. Does not check
    /// expiration.
    pub fn get(&self, key: &str) -> Option<Arc<HotEntry>> {
        self.lock()
            .entries
            .get_refresh(key)
            .map(|entry| Arc::clone(entry))
    }

    // == Generation ==
    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    // == Put ==
    /// Inserts or replaces an entry, evicting the least recently used one when
    /// over capacity. Returns the evicted key, if any.
    pub fn put(&self, key: impl Into<String>, entry: Arc<HotEntry>) -> Option<String> {
        if self.capacity == 0 {
            return None;
        }
        self.lock().insert(key.into(), entry, self.capacity)
    }

    // == Put If Current ==
    /// Inserts only if no invalidation happened since `generation` was read.
    /// Returns whether the entry was inserted.
    pub fn put_if_current(
        &self,
        key: impl Into<String>,
        entry: Arc<HotEntry>,
        generation: u64,
    ) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.insert(key.into(), entry, self.capacity);
        true
    }

    // == Remove ==
    /// Drops one entry without affecting the generation.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    // == Invalidate ==
    /// Drops one entry and bumps the generation.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.lock();
        state.generation += 1;
        state.entries.remove(key).is_some()
    }

    // == Remove Category ==
    /// Drops every entry tagged with `category` and bumps the generation.
    pub fn remove_category(&self, category: &str) -> usize {
        let mut state = self.lock();
        state.generation += 1;
        state.remove_where(|entry| entry.category == category)
    }

    // == Purge Expired ==
    /// Drops every entry expired at `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.lock().remove_where(|entry| entry.is_expired_at(now))
    }

    // == Clear ==
    /// Drops everything and bumps the generation.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        state.generation += 1;
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn hot(category: &str, expires_in: TimeDelta) -> Arc<HotEntry> {
        let now = Utc::now();
        Arc::new(HotEntry {
            payload: Payload::Int(1),
            category: category.to_string(),
            created_at: now,
            expires_at: now + expires_in,
            size_bytes: 8,
        })
    }

    fn fresh() -> Arc<HotEntry> {
        hot("screen_run", TimeDelta::hours(1))
    }

    #[test]
    fn test_memory_new() {
        let tier = MemoryTier::new(3);
        assert!(tier.is_empty());
        assert_eq!(tier.capacity(), 3);
    }

    #[test]
    fn test_put_and_get() {
        let tier = MemoryTier::new(3);
        tier.put("key1", fresh());

        assert_eq!(tier.len(), 1);
        assert!(tier.get("key1").is_some());
        assert!(tier.get("missing").is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let tier = MemoryTier::new(3);
        tier.put("key1", fresh());
        tier.put("key2", fresh());
        tier.put("key3", fresh());

        // Cache is full, adding key4 should evict key1 (oldest)
        assert_eq!(tier.put("key4", fresh()), Some("key1".to_string()));
        assert_eq!(tier.len(), 3);
        assert!(tier.get("key1").is_none());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let tier = MemoryTier::new(3);
        tier.put("key1", fresh());
        tier.put("key2", fresh());
        tier.put("key3", fresh());

        // Access key1 to make it most recently used
        tier.get("key1");

        // Adding key4 should evict key2 (now oldest)
        assert_eq!(tier.put("key4", fresh()), Some("key2".to_string()));
        assert!(tier.get("key1").is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let tier = MemoryTier::new(2);
        tier.put("key1", fresh());
        tier.put("key2", fresh());

        assert_eq!(tier.put("key1", hot("other", TimeDelta::hours(2))), None);
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get("key1").unwrap().category, "other");
    }

    #[test]
    fn test_zero_capacity_disables_tier() {
        let tier = MemoryTier::new(0);
        assert_eq!(tier.put("key1", fresh()), None);
        assert!(tier.get("key1").is_none());
    }

    #[test]
    fn test_remove_category() {
        let tier = MemoryTier::new(10);
        tier.put("a1", hot("A", TimeDelta::hours(1)));
        tier.put("a2", hot("A", TimeDelta::hours(1)));
        tier.put("b1", hot("B", TimeDelta::hours(1)));

        assert_eq!(tier.remove_category("A"), 2);
        assert!(tier.get("a1").is_none());
        assert!(tier.get("b1").is_some());
    }

    #[test]
    fn test_purge_expired() {
        let tier = MemoryTier::new(10);
        tier.put("stale", hot("A", TimeDelta::hours(-1)));
        tier.put("live", hot("A", TimeDelta::hours(1)));

        assert_eq!(tier.purge_expired(Utc::now()), 1);
        assert!(tier.get("live").is_some());
    }

    #[test]
    fn test_put_if_current_rejected_after_invalidation() {
        let tier = MemoryTier::new(10);
        let generation = tier.generation();

        tier.remove_category("A");
        assert!(!tier.put_if_current("a1", hot("A", TimeDelta::hours(1)), generation));
        assert!(tier.get("a1").is_none());

        let generation = tier.generation();
        assert!(tier.put_if_current("a1", hot("A", TimeDelta::hours(1)), generation));
        assert!(tier.get("a1").is_some());
    }

    #[test]
    fn test_every_invalidation_bumps_generation() {
        let tier = MemoryTier::new(10);
        let start = tier.generation();

        tier.invalidate("missing");
        tier.remove_category("A");
        tier.clear();
        assert_eq!(tier.generation(), start + 3);

        // Plain removal and expiry purges are bookkeeping, not invalidation
        tier.put("key1", fresh());
        tier.remove("key1");
        tier.purge_expired(Utc::now());
        assert_eq!(tier.generation(), start + 3);
    }

    #[test]
    fn test_clear() {
        let tier = MemoryTier::new(10);
        tier.put("key1", fresh());
        tier.put("key2", fresh());

        assert_eq!(tier.clear(), 2);
        assert!(tier.is_empty());
    }
}
