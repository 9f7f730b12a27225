//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::RefreshClock;
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Portfolio123 refreshes its data around 03:00 US/Eastern, which is the default
/// refresh boundary.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; a disabled cache misses on every read and stores nothing
    pub enabled: bool,
    /// SQLite database file backing the persistent tier
    pub db_path: PathBuf,
    /// Daily refresh time of day, `HH:MM`
    pub refresh_time: String,
    /// IANA zone name the refresh time is expressed in
    pub timezone: String,
    /// Entries held by the in-memory tier (0 disables it)
    pub memory_capacity: usize,
    /// Optional hard cap on persisted entries
    pub max_entries: Option<usize>,
    /// Soft cap on persisted payload bytes, in megabytes
    pub max_size_mb: u64,
    /// Whether hit/miss counters are maintained
    pub enable_statistics: bool,
    /// Whether the binary spawns the periodic expiration sweep
    pub auto_cleanup: bool,
    /// Seconds between expiration sweeps
    pub cleanup_interval_secs: u64,
    /// Upper bound on how long a database call waits for a lock
    pub busy_timeout_ms: u64,
    /// Port for the maintenance HTTP server
    pub server_port: u16,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `P123_CACHE_ENABLED` - Enable caching (default: true)
    /// - `P123_CACHE_PATH` - Database file (default: ~/.p123cache/cache.db)
    /// - `P123_CACHE_REFRESH_TIME` - Daily refresh time (default: 03:00)
    /// - `P123_CACHE_TIMEZONE` - Refresh time zone (default: US/Eastern)
    /// - `P123_CACHE_MEMORY_CAPACITY` - Memory tier entries (default: 256)
    /// - `P123_CACHE_MAX_ENTRIES` - Persisted entry cap (default: unset)
    /// - `P123_CACHE_MAX_SIZE_MB` - Persisted size cap (default: 100)
    /// - `P123_CACHE_STATISTICS` - Track hits and misses (default: true)
    /// - `P123_CACHE_AUTO_CLEANUP` - Run the expiration sweep (default: true)
    /// - `P123_CACHE_CLEANUP_INTERVAL` - Sweep interval in seconds (default: 300)
    /// - `P123_CACHE_BUSY_TIMEOUT_MS` - Lock wait budget (default: 5000)
    /// - `P123_CACHE_PORT` - Maintenance server port (default: 3123)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("P123_CACHE_ENABLED", defaults.enabled),
            db_path: env::var("P123_CACHE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| expand_home(&v))
                .unwrap_or(defaults.db_path),
            refresh_time: env::var("P123_CACHE_REFRESH_TIME").unwrap_or(defaults.refresh_time),
            timezone: env::var("P123_CACHE_TIMEZONE").unwrap_or(defaults.timezone),
            memory_capacity: env_or("P123_CACHE_MEMORY_CAPACITY", defaults.memory_capacity),
            max_entries: env::var("P123_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_size_mb: env_or("P123_CACHE_MAX_SIZE_MB", defaults.max_size_mb),
            enable_statistics: env_or("P123_CACHE_STATISTICS", defaults.enable_statistics),
            auto_cleanup: env_or("P123_CACHE_AUTO_CLEANUP", defaults.auto_cleanup),
            cleanup_interval_secs: env_or(
                "P123_CACHE_CLEANUP_INTERVAL",
                defaults.cleanup_interval_secs,
            ),
            busy_timeout_ms: env_or("P123_CACHE_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms),
            server_port: env_or("P123_CACHE_PORT", defaults.server_port),
        }
    }

    // == Validate ==
    /// Checks that the refresh time and time zone can be turned into a clock
    /// and that the sweep interval is usable.
    pub fn validate(&self) -> Result<()> {
        if self.auto_cleanup && self.cleanup_interval_secs == 0 {
            return Err(CacheError::Config(
                "cleanup interval must be at least one second".to_string(),
            ));
        }
        self.refresh_clock().map(|_| ())
    }

    // == Refresh Clock ==
    /// Builds the refresh-boundary clock described by this configuration.
    pub fn refresh_clock(&self) -> Result<RefreshClock> {
        RefreshClock::parse(&self.refresh_time, &self.timezone)
    }

    /// Lock wait budget as a Duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Persisted size cap in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// Returns this configuration pointed at another database file.
    pub fn with_db_path(mut self, path: impl AsRef<Path>) -> Self {
        self.db_path = path.as_ref().to_path_buf();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
            refresh_time: "03:00".to_string(),
            timezone: "US/Eastern".to_string(),
            memory_capacity: 256,
            max_entries: None,
            max_size_mb: 100,
            enable_statistics: true,
            auto_cleanup: true,
            cleanup_interval_secs: 300,
            busy_timeout_ms: 5000,
            server_port: 3123,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".p123cache")
        .join("cache.db")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
