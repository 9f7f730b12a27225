//! Response DTOs for the cache maintenance API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStatistics;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of reads served from cache
    pub hits: u64,
    /// Number of reads that missed
    pub misses: u64,
    /// Hit ratio (hits / (hits + misses))
    pub hit_ratio: f64,
    /// Entries currently persisted
    pub total_entries: usize,
    /// Payload bytes currently persisted
    pub total_bytes: u64,
}

impl From<CacheStatistics> for StatsResponse {
    fn from(stats: CacheStatistics) -> Self {
        Self {
            hit_ratio: stats.hit_ratio(),
            hits: stats.hits,
            misses: stats.misses,
            total_entries: stats.total_entries,
            total_bytes: stats.total_bytes,
        }
    }
}

/// Response body for every endpoint that removes entries
/// (DELETE /cache, DELETE /cache/:category, POST /sweep, POST /refresh)
#[derive(Debug, Clone, Serialize)]
pub struct RemovedResponse {
    /// Human readable summary
    pub message: String,
    /// Number of entries removed
    pub removed: usize,
}

impl RemovedResponse {
    pub fn new(message: impl Into<String>, removed: usize) -> Self {
        Self {
            message: message.into(),
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status, "healthy" or "degraded"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Whether the persistent tier is reachable
    pub cache_active: bool,
}

impl HealthResponse {
    /// Creates a HealthResponse with the current timestamp.
    ///
    /// A cache that cannot reach its database still serves requests (every
    /// read misses), so it reports "degraded" rather than failing.
    pub fn for_cache(cache_active: bool) -> Self {
        Self {
            status: if cache_active { "healthy" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            cache_active,
        }
    }
}
