//! Expiration Sweep Task
//!
//! Background task that periodically deletes entries whose refresh boundary
//! has passed. It only ever removes logically expired entries, so racing with
//! foreground reads and writes is harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// Each sweep runs on the blocking pool, since it talks to SQLite.
///
/// # Arguments
/// * `cache` - Shared cache manager
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheManager::new(CacheConfig::from_env())?);
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<CacheManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiration sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || cache.sweep_expired()).await {
                Ok(0) => debug!("Expiration sweep: no expired entries found"),
                Ok(removed) => info!("Expiration sweep: removed {} expired entries", removed),
                Err(e) => warn!("Expiration sweep panicked: {}", e),
            }
        }
    })
}
