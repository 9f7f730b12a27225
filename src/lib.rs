//! p123 Cache - Two-tier response cache for the Portfolio123 API client
//!
//! Results of expensive API calls are keyed by a hash of the operation name
//! and its normalized parameters, kept in a bounded in-memory LRU tier backed
//! by a SQLite file, and expire at the next daily data refresh.
//!
//! ```ignore
//! let cache = CacheManager::new(CacheConfig::from_env())?;
//! let params = Params::new().with("screen_id", 42).with("as_of", as_of);
//! if let Some(result) = cache.get("screen_run", &params, false)? {
//!     return Ok(result);
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheManager, CacheStatistics, Param, Params, Payload, PutOptions, Table};
pub use config::CacheConfig;
pub use error::{CacheError, DecodeError, Result};
pub use tasks::spawn_sweep_task;
