//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache.
//!
//! # Tasks
//! - Expiration sweep: removes expired entries at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
