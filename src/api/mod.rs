//! API Module
//!
//! HTTP handlers and routing for the cache maintenance API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Get cache statistics
//! - `POST /stats/reset` - Reset hit/miss counters
//! - `POST /sweep` - Remove expired entries
//! - `POST /refresh` - Invalidate after an upstream data refresh
//! - `DELETE /cache` - Invalidate everything
//! - `DELETE /cache/:category` - Invalidate one category

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
