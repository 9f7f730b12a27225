//! Response models for the cache maintenance API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{HealthResponse, RemovedResponse, StatsResponse};
