//! API Routes
//!
//! Configures the Axum router with all cache maintenance endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, invalidate_all_handler, invalidate_category_handler, refresh_handler,
    reset_stats_handler, stats_handler, sweep_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check, reports whether storage is reachable
/// - `GET /stats` - Hit/miss counters and persisted size
/// - `POST /stats/reset` - Zero the hit/miss counters
/// - `POST /sweep` - Remove expired entries now
/// - `POST /refresh` - Drop everything after an early data refresh
/// - `DELETE /cache` - Drop everything
/// - `DELETE /cache/:category` - Drop one endpoint family
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route("/sweep", post(sweep_handler))
        .route("/refresh", post(refresh_handler))
        .route("/cache", delete(invalidate_all_handler))
        .route("/cache/:category", delete(invalidate_category_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn create_test_app(dir: &TempDir) -> Router {
        let config = CacheConfig::default().with_db_path(dir.path().join("cache.db"));
        create_router(AppState::from_config(&config).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_category_endpoint() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache/screen_run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(Request::builder().uri("/get/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
