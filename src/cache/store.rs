//! Persistent Store Module
//!
//! SQLite-backed durable tier. Every thread gets its own connection; SQLite's
//! own locking serializes writers across connections, bounded by the busy
//! timeout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, FORMAT_VERSION};
use crate::error::{CacheError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key              TEXT PRIMARY KEY,
        data             BLOB NOT NULL,
        category         TEXT NOT NULL,
        created_at       INTEGER NOT NULL,
        expires_at       INTEGER NOT NULL,
        access_count     INTEGER NOT NULL DEFAULT 0,
        last_accessed_at INTEGER,
        size_bytes       INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_category
        ON cache_entries(category);
    CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at
        ON cache_entries(expires_at);
    CREATE INDEX IF NOT EXISTS idx_cache_entries_last_accessed
        ON cache_entries(last_accessed_at);
    CREATE TABLE IF NOT EXISTS cache_metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const ENTRY_COLUMNS: &str = "key, data, category, created_at, expires_at, \
                             access_count, last_accessed_at, size_bytes";

/// Fraction of the byte limit kept after a size-triggered trim.
const TRIM_TARGET_PERCENT: u64 = 80;

type SharedConnection = Arc<Mutex<Connection>>;

thread_local! {
    /// Dropped when the owning thread exits; pooled connections whose token
    /// can no longer be upgraded belong to dead threads.
    static THREAD_ALIVE: Arc<()> = Arc::new(());
}

#[derive(Debug)]
struct PooledConnection {
    alive: Weak<()>,
    conn: SharedConnection,
}

// == Store Summary ==
/// Entry count and payload bytes currently persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub total_entries: usize,
    pub total_bytes: u64,
}

// == Sqlite Store ==
/// Durable key → entry table with category and expiration queries.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
    connections: Mutex<HashMap<ThreadId, PooledConnection>>,
}

impl SqliteStore {
    // == Open ==
    /// Opens (creating if needed) the database at `path` and prepares the
    /// schema.
    ///
    /// If the file was written by a different payload format version, its
    /// entries are discarded.
    ///
    /// # Arguments
    /// * `path` - Database file
    /// * `busy_timeout` - How long any call may wait on another writer
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::StorageUnavailable(format!("{}: {e}", parent.display()))
            })?;
        }

        let store = Self {
            path,
            busy_timeout,
            connections: Mutex::new(HashMap::new()),
        };
        store.with_conn(init_schema)?;
        debug!("Opened cache database at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Put ==
    /// Inserts or atomically replaces the entry under `entry.key`.
    pub fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                    (key, data, category, created_at, expires_at,
                     access_count, last_accessed_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.key,
                    entry.blob,
                    entry.category,
                    entry.created_at.timestamp_millis(),
                    entry.expires_at.timestamp_millis(),
                    entry.access_count as i64,
                    entry.last_accessed_at.map(|t| t.timestamp_millis()),
                    entry.size_bytes as i64,
                ],
            )
            .map(|_| ())
        })
    }

    // == Get ==
    /// Fetches an entry, expired or not. A missing key is `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE key = ?1"),
                params![key],
                row_to_entry,
            )
            .optional()
        })
    }

    // == Record Access ==
    /// Bumps the read statistics of the entry written at `created_at`.
    ///
    /// Returns false when that version of the entry is no longer stored,
    /// either deleted or replaced by a newer write.
    pub fn record_access(
        &self,
        key: &str,
        created_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE cache_entries
                 SET access_count = access_count + 1, last_accessed_at = ?3
                 WHERE key = ?1 AND created_at = ?2",
                params![key, created_at.timestamp_millis(), at.timestamp_millis()],
            )
            .map(|n| n > 0)
        })
    }

    // == Delete ==
    /// Removes one entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                .map(|n| n > 0)
        })
    }

    // == Delete Stale ==
    /// Removes the entry only if it is still the version written at
    /// `created_at`. A concurrent rewrite of the key survives.
    pub fn delete_stale(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE key = ?1 AND created_at = ?2",
                params![key, created_at.timestamp_millis()],
            )
            .map(|n| n > 0)
        })
    }

    // == Delete By Category ==
    pub fn delete_by_category(&self, category: &str) -> Result<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE category = ?1",
                params![category],
            )
        })
    }

    // == Delete Expired ==
    /// Removes every entry whose `expires_at` is at or before `before`.
    pub fn delete_expired(&self, before: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE expires_at <= ?1",
                params![before.timestamp_millis()],
            )
        })
    }

    // == Clear ==
    pub fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| conn.execute("DELETE FROM cache_entries", []))
    }

    // == Summary ==
    pub fn summary(&self) -> Result<StoreSummary> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                [],
                |row| {
                    Ok(StoreSummary {
                        total_entries: row.get::<_, i64>(0)?.max(0) as usize,
                        total_bytes: row.get::<_, i64>(1)?.max(0) as u64,
                    })
                },
            )
        })
    }

    // == Trim ==
    /// Enforces the entry and byte limits by deleting least recently accessed
    /// entries first. A byte overflow trims down to 80% of `max_bytes`.
    ///
    /// Returns the removed keys.
    pub fn trim(&self, max_entries: Option<usize>, max_bytes: Option<u64>) -> Result<Vec<String>> {
        let removed = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let (mut count, mut bytes): (i64, i64) = tx.query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let count_target = max_entries
                .map(|max| max as i64)
                .filter(|max| count > *max);
            let bytes_target = max_bytes
                .filter(|max| bytes > *max as i64)
                .map(|max| (max * TRIM_TARGET_PERCENT / 100) as i64);

            let over_limit = |count: i64, bytes: i64| {
                count_target.is_some_and(|t| count > t) || bytes_target.is_some_and(|t| bytes > t)
            };

            let mut removed = Vec::new();
            if over_limit(count, bytes) {
                let candidates: Vec<(String, i64)> = {
                    let mut stmt = tx.prepare(
                        "SELECT key, size_bytes FROM cache_entries
                         ORDER BY COALESCE(last_accessed_at, created_at) ASC, key ASC",
                    )?;
                    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                    rows.collect::<rusqlite::Result<Vec<(String, i64)>>>()?
                };

                let mut delete = tx.prepare("DELETE FROM cache_entries WHERE key = ?1")?;
                for (key, size) in candidates {
                    if !over_limit(count, bytes) {
                        break;
                    }
                    delete.execute(params![key])?;
                    count -= 1;
                    bytes -= size;
                    removed.push(key);
                }
            }

            tx.commit()?;
            Ok(removed)
        })?;

        if !removed.is_empty() {
            info!("Cache trim: removed {} entries over limit", removed.len());
        }
        Ok(removed)
    }

    // == Close ==
    /// Drops every pooled connection. Later calls reopen lazily.
    pub fn close(&self) {
        match self.connections.lock() {
            Ok(mut pool) => pool.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    // == Pooled Connections ==
    /// Number of live pooled connections, after dropping those of exited
    /// threads.
    pub fn pooled_connections(&self) -> usize {
        match self.connections.lock() {
            Ok(mut pool) => prune_dead(&mut pool),
            Err(poisoned) => prune_dead(&mut poisoned.into_inner()),
        }
    }

    // == Connection Handling ==
    fn connection(&self) -> Result<SharedConnection> {
        let id = thread::current().id();
        {
            let pool = self
                .connections
                .lock()
                .map_err(|e| CacheError::StorageUnavailable(e.to_string()))?;
            if let Some(pooled) = pool.get(&id) {
                return Ok(Arc::clone(&pooled.conn));
            }
        }

        // Opened outside the pool lock so a slow open never blocks other threads
        let conn = Arc::new(Mutex::new(open_connection(&self.path, self.busy_timeout)?));
        let alive = THREAD_ALIVE.with(Arc::downgrade);

        let mut pool = self
            .connections
            .lock()
            .map_err(|e| CacheError::StorageUnavailable(e.to_string()))?;
        let before = pool.len();
        let remaining = prune_dead(&mut pool);
        if remaining < before {
            debug!("Closed {} connections of exited threads", before - remaining);
        }
        let pooled = pool.entry(id).or_insert(PooledConnection { alive, conn });
        Ok(Arc::clone(&pooled.conn))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self.connection()?;
        let mut guard = conn
            .lock()
            .map_err(|e| CacheError::StorageUnavailable(e.to_string()))?;
        f(&mut guard).map_err(|e| {
            warn!("SQLite error on {}: {e}", self.path.display());
            CacheError::from(e)
        })
    }
}

/// Drops connections whose owning thread has exited. Returns the pool size.
fn prune_dead(pool: &mut HashMap<ThreadId, PooledConnection>) -> usize {
    pool.retain(|_, pooled| pooled.alive.strong_count() > 0);
    pool.len()
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

fn init_schema(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(SCHEMA)?;

    let stored: Option<String> = tx
        .query_row(
            "SELECT value FROM cache_metadata WHERE key = 'format_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let current = FORMAT_VERSION.to_string();
    if stored.as_deref() != Some(current.as_str()) {
        if let Some(old) = &stored {
            let dropped = tx.execute("DELETE FROM cache_entries", [])?;
            warn!("Cache format changed from {old} to {current}; discarded {dropped} entries");
        }
        tx.execute(
            "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('format_version', ?1)",
            params![current],
        )?;
    }

    tx.commit()
}

fn row_to_entry(row: &Row) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        key: row.get(0)?,
        blob: row.get(1)?,
        category: row.get(2)?,
        created_at: millis_to_datetime(row, 3)?,
        expires_at: millis_to_datetime(row, 4)?,
        access_count: row.get::<_, i64>(5)?.max(0) as u64,
        last_accessed_at: match row.get::<_, Option<i64>>(6)? {
            Some(_) => Some(millis_to_datetime(row, 6)?),
            None => None,
        },
        size_bytes: row.get::<_, i64>(7)?.max(0) as u64,
    })
}

fn millis_to_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}
