//! Cache Manager Module
//!
//! Orchestrates key derivation, the memory and persistent tiers, expiration
//! and statistics. Storage and decode failures are logged and turned into
//! misses or not-stored results; only malformed parameters reach the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{
    codec, derive_key, now_millis, CacheEntry, CacheStatistics, HitCounter, HotEntry, MemoryTier,
    Params, Payload, RefreshClock, SqliteStore,
};
use crate::config::CacheConfig;
use crate::error::Result;

// == Put Options ==
/// Per-write knobs for [`CacheManager::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Fixed lifetime instead of the next refresh boundary
    pub ttl: Option<Duration>,
    /// Skip the cache entirely
    pub bypass: bool,
}

impl PutOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }
}

// == Cache Manager ==
/// Two-tier response cache for one process.
///
/// Share it between threads with an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    clock: RefreshClock,
    store: Option<SqliteStore>,
    memory: MemoryTier,
    stats: HitCounter,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager from configuration.
    ///
    /// An invalid refresh time or zone is an error. A database that cannot be
    /// opened is not: the manager then runs without a persistent tier, missing
    /// on every read and storing nothing.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let clock = config.refresh_clock()?;

        let store = if config.enabled {
            match SqliteStore::open(&config.db_path, config.busy_timeout()) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Cache storage unavailable, caching disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Cache initialized: enabled={}, db={}, refresh={} {}, memory_capacity={}",
            config.enabled,
            config.db_path.display(),
            config.refresh_time,
            config.timezone,
            config.memory_capacity
        );

        Ok(Self {
            memory: MemoryTier::new(config.memory_capacity),
            config,
            clock,
            store,
            stats: HitCounter::new(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &RefreshClock {
        &self.clock
    }

    /// Whether reads and writes can reach the persistent tier.
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.store.is_some()
    }

    // == Get ==
    /// Returns the cached result for `(operation, params)` if one is present
    /// and unexpired.
    ///
    /// # Errors
    /// `InvalidParameters` if the parameters cannot be normalized. Every other
    /// failure is reported as a miss.
    pub fn get(&self, operation: &str, params: &Params, bypass: bool) -> Result<Option<Payload>> {
        let key = derive_key(operation, params)?;

        let found = match (&self.store, bypass) {
            (Some(store), false) if self.config.enabled => self.lookup(store, &key),
            _ => None,
        };

        match &found {
            Some(_) => {
                debug!("Cache hit for {operation} ({key})");
                self.record(true);
            }
            None => {
                debug!("Cache miss for {operation} ({key})");
                self.record(false);
            }
        }
        Ok(found)
    }

    fn lookup(&self, store: &SqliteStore, key: &str) -> Option<Payload> {
        let now = now_millis();

        if let Some(hot) = self.memory.get(key) {
            if hot.is_expired_at(now) {
                self.memory.remove(key);
            } else {
                // The row may have been deleted or rewritten by another manager
                match store.record_access(key, hot.created_at, now) {
                    Ok(true) => return Some(hot.payload.clone()),
                    Ok(false) => {
                        debug!("Dropping {key} from memory, no longer persisted");
                        self.memory.remove(key);
                    }
                    Err(e) => {
                        debug!("Failed to record access for {key}: {e}");
                        return Some(hot.payload.clone());
                    }
                }
            }
        }

        // Captured before the read so a racing invalidation blocks promotion
        let generation = self.memory.generation();

        let entry = match store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed, treating as miss: {e}");
                return None;
            }
        };

        if entry.is_expired_at(now) {
            self.discard(store, &entry);
            return None;
        }

        let payload = match codec::decode(&entry.blob) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Discarding undecodable cache entry {key}: {e}");
                self.discard(store, &entry);
                return None;
            }
        };

        if let Err(e) = store.record_access(key, entry.created_at, now) {
            debug!("Failed to record access for {key}: {e}");
        }

        self.memory.put_if_current(
            key,
            Arc::new(HotEntry {
                payload: payload.clone(),
                category: entry.category,
                created_at: entry.created_at,
                expires_at: entry.expires_at,
                size_bytes: entry.size_bytes,
            }),
            generation,
        );
        Some(payload)
    }

    /// Deletes the persisted version that was just read, sparing a newer
    /// write of the same key.
    fn discard(&self, store: &SqliteStore, entry: &CacheEntry) {
        if let Err(e) = store.delete_stale(&entry.key, entry.created_at) {
            debug!("Failed to delete stale entry {}: {e}", entry.key);
        }
    }

    fn record(&self, hit: bool) {
        if !self.config.enable_statistics {
            return;
        }
        if hit {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
    }

    // == Put ==
    /// Stores a result and reports whether it was stored.
    ///
    /// Expiration is the next refresh boundary unless `options.ttl` is set.
    /// A failed persistent write leaves the memory tier untouched.
    ///
    /// # Errors
    /// `InvalidParameters` if the parameters cannot be normalized.
    pub fn put(
        &self,
        operation: &str,
        params: &Params,
        payload: &Payload,
        category: &str,
        options: PutOptions,
    ) -> Result<bool> {
        let key = derive_key(operation, params)?;

        let store = match &self.store {
            Some(store) if self.config.enabled && !options.bypass => store,
            _ => return Ok(false),
        };

        let generation = self.memory.generation();
        let created_at = now_millis();
        let expires_at = self.clock.expiration(created_at, options.ttl);
        let blob = codec::encode(payload)?;
        let entry = CacheEntry::new(&key, category, blob, created_at, expires_at);

        if let Err(e) = store.put(&entry) {
            warn!("Cache write failed for {operation}, result not stored: {e}");
            return Ok(false);
        }

        match store.trim(self.config.max_entries, Some(self.config.max_size_bytes())) {
            Ok(removed) => {
                for trimmed in &removed {
                    self.memory.remove(trimmed);
                }
                if removed.contains(&key) {
                    debug!("Entry for {operation} exceeded the size limit and was trimmed");
                    return Ok(false);
                }
            }
            Err(e) => debug!("Cache trim failed: {e}"),
        }

        self.memory.put_if_current(
            key.clone(),
            Arc::new(HotEntry {
                payload: payload.clone(),
                category: entry.category,
                created_at,
                expires_at,
                size_bytes: entry.size_bytes,
            }),
            generation,
        );

        debug!("Cached {operation} ({key}) until {expires_at}");
        Ok(true)
    }

    // == Fetch With ==
    /// Read-through helper: returns the cached result or runs `fetch`, caching
    /// its result on success.
    ///
    /// Errors from `fetch` are returned untouched and nothing is cached.
    pub fn fetch_with<F, E>(
        &self,
        operation: &str,
        params: &Params,
        category: &str,
        bypass: bool,
        fetch: F,
    ) -> std::result::Result<Payload, E>
    where
        F: FnOnce() -> std::result::Result<Payload, E>,
        E: From<crate::error::CacheError>,
    {
        if let Some(cached) = self.get(operation, params, bypass)? {
            return Ok(cached);
        }

        let fresh = fetch()?;
        self.put(
            operation,
            params,
            &fresh,
            category,
            PutOptions::default().bypass(bypass),
        )?;
        Ok(fresh)
    }

    // == Invalidate ==
    /// Removes the entry for one `(operation, params)` pair.
    pub fn invalidate(&self, operation: &str, params: &Params) -> Result<bool> {
        let key = derive_key(operation, params)?;
        let on_disk = match &self.store {
            Some(store) => store.delete(&key).unwrap_or_else(|e| {
                warn!("Cache delete failed: {e}");
                false
            }),
            None => false,
        };
        let in_memory = self.memory.invalidate(&key);
        Ok(in_memory || on_disk)
    }

    // == Invalidate Category ==
    /// Removes every entry tagged with `category` from both tiers.
    ///
    /// Rows go first; the memory tier is cleared afterwards so a concurrent
    /// reader cannot re-promote a row it read before the delete.
    pub fn invalidate_category(&self, category: &str) -> usize {
        let on_disk = self.store.as_ref().map(|store| {
            store.delete_by_category(category).unwrap_or_else(|e| {
                warn!("Failed to invalidate category {category}: {e}");
                0
            })
        });
        let in_memory = self.memory.remove_category(category);
        let removed = on_disk.unwrap_or(in_memory);
        info!("Invalidated {removed} cached entries for {category}");
        removed
    }

    // == Invalidate All ==
    /// Empties both tiers and resets statistics.
    pub fn invalidate_all(&self) -> usize {
        let on_disk = self.store.as_ref().map(|store| {
            store.clear().unwrap_or_else(|e| {
                warn!("Failed to clear cache: {e}");
                0
            })
        });
        let in_memory = self.memory.clear();
        let removed = on_disk.unwrap_or(in_memory);
        self.stats.reset();
        info!("Invalidated all {removed} cached entries");
        removed
    }

    // == Force Refresh ==
    /// Call when the upstream data has just been refreshed.
    pub fn force_refresh(&self) -> usize {
        let removed = self.invalidate_all();
        info!("Cache forcibly invalidated after upstream data update");
        removed
    }

    // == Sweep Expired ==
    /// Removes entries that are already expired from both tiers.
    pub fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let in_memory = self.memory.purge_expired(now);
        match &self.store {
            Some(store) => store.delete_expired(now).unwrap_or_else(|e| {
                warn!("Expiration sweep failed: {e}");
                0
            }),
            None => in_memory,
        }
    }

    // == Statistics ==
    pub fn statistics(&self) -> CacheStatistics {
        let summary = self
            .store
            .as_ref()
            .and_then(|store| match store.summary() {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Failed to read cache size: {e}");
                    None
                }
            })
            .unwrap_or_default();

        CacheStatistics {
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            total_entries: summary.total_entries,
            total_bytes: summary.total_bytes,
        }
    }

    // == Reset Statistics ==
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    // == Close ==
    /// Releases pooled database connections. The manager stays usable.
    pub fn close(&self) {
        if let Some(store) = &self.store {
            store.close();
        }
    }
}
