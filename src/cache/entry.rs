//! Cache Entry Module
//!
//! Defines the persisted unit of storage with its expiration metadata.

use chrono::{DateTime, SubsecRound, Utc};

// == Cache Entry ==
/// One cached result as stored in the persistent tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Derived cache key (hex SHA-256)
    pub key: String,
    /// Category tag used for bulk invalidation
    pub category: String,
    /// Encoded payload blob
    pub blob: Vec<u8>,
    /// Write time
    pub created_at: DateTime<Utc>,
    /// First instant at which the entry is no longer served
    pub expires_at: DateTime<Utc>,
    /// Successful reads since the entry was written
    pub access_count: u64,
    /// Time of the most recent successful read
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Length of `blob` in bytes
    pub size_bytes: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a fresh entry with zeroed access statistics.
    ///
    /// # Arguments
    /// * `key` - Derived cache key
    /// * `category` - Category tag
    /// * `blob` - Encoded payload
    /// * `created_at` - Write time
    /// * `expires_at` - Expiration instant
    pub fn new(
        key: impl Into<String>,
        category: impl Into<String>,
        blob: Vec<u8>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let size_bytes = blob.len() as u64;
        Self {
            key: key.into(),
            category: category.into(),
            blob,
            created_at,
            expires_at,
            access_count: 0,
            last_accessed_at: None,
            size_bytes,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks if the entry has expired at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

// == Utility Functions ==
/// Current time truncated to the millisecond precision the store keeps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
