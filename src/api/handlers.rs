//! API Handlers
//!
//! HTTP request handlers for the cache maintenance endpoints.
//!
//! The cache engine is synchronous and talks to SQLite, so every handler that
//! touches it hops onto the blocking pool first.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::CacheManager;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, RemovedResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache manager; it synchronizes internally
    pub cache: Arc<CacheManager>,
}

impl AppState {
    /// Creates a new AppState around an existing cache manager.
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = CacheManager::new(config.clone())?;
        Ok(Self::new(Arc::new(cache)))
    }
}

/// Runs a cache operation on the blocking pool.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CacheManager) -> T + Send + 'static,
{
    let cache = Arc::clone(&state.cache);
    tokio::task::spawn_blocking(move || op(&cache))
        .await
        .map_err(|e| CacheError::StorageUnavailable(format!("cache task failed: {e}")))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::for_cache(state.cache.is_active()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = blocking(&state, |cache| cache.statistics()).await?;
    Ok(Json(stats.into()))
}

/// Handler for POST /stats/reset
pub async fn reset_stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = blocking(&state, |cache| {
        cache.reset_statistics();
        cache.statistics()
    })
    .await?;
    Ok(Json(stats.into()))
}

/// Handler for POST /sweep
///
/// Runs an expiration sweep immediately instead of waiting for the
/// background task.
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<RemovedResponse>> {
    let removed = blocking(&state, |cache| cache.sweep_expired()).await?;
    Ok(Json(RemovedResponse::new(
        format!("Swept {removed} expired entries"),
        removed,
    )))
}

/// Handler for POST /refresh
///
/// Signals that upstream data was refreshed early; drops everything.
pub async fn refresh_handler(State(state): State<AppState>) -> Result<Json<RemovedResponse>> {
    let removed = blocking(&state, |cache| cache.force_refresh()).await?;
    Ok(Json(RemovedResponse::new(
        "Cache invalidated after data refresh",
        removed,
    )))
}

/// Handler for DELETE /cache
pub async fn invalidate_all_handler(
    State(state): State<AppState>,
) -> Result<Json<RemovedResponse>> {
    let removed = blocking(&state, |cache| cache.invalidate_all()).await?;
    Ok(Json(RemovedResponse::new(
        format!("Invalidated all {removed} entries"),
        removed,
    )))
}

/// Handler for DELETE /cache/:category
pub async fn invalidate_category_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<RemovedResponse>> {
    if category.trim().is_empty() {
        return Err(CacheError::InvalidParameters(
            "category cannot be empty".to_string(),
        ));
    }

    let message = format!("Invalidated category '{category}'");
    let removed = blocking(&state, move |cache| cache.invalidate_category(&category)).await?;
    Ok(Json(RemovedResponse::new(message, removed)))
}
