//! Cache Module
//!
//! Two-tier response caching: deterministic keys, a bounded memory tier in
//! front of a durable SQLite tier, and expiration at the daily data refresh.

mod clock;
pub mod codec;
mod entry;
mod key;
mod manager;
mod memory;
mod params;
mod payload;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::RefreshClock;
pub use codec::FORMAT_VERSION;
pub use entry::{now_millis, CacheEntry};
pub use key::{canonical_params, derive_key};
pub use manager::{CacheManager, PutOptions};
pub use memory::{HotEntry, MemoryTier};
pub use params::{Param, Params};
pub use payload::{Cell, Payload, Table};
pub use stats::{CacheStatistics, HitCounter};
pub use store::{SqliteStore, StoreSummary};
