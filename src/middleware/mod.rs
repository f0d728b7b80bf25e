//! Middleware for observability and throttling.
//!
//! This module provides:
//! - Request logging with latency tracking and a slow-request threshold
//! - Per-identity throttling driven by route policies

pub mod logging;
pub mod rate_limit;

pub use logging::{request_logging, LoggingConfig};
pub use rate_limit::{throttle_middleware, ThrottleLayer};
