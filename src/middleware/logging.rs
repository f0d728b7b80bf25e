//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.
//! Requests slower than the configured threshold are logged at WARN.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig {
    pub slow_request: Duration,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            slow_request: Duration::from_millis(crate::config::DEFAULT_SLOW_REQUEST_MS),
        }
    }
}

/// Middleware that logs HTTP requests with timing information.
pub async fn request_logging(
    State(config): State<LoggingConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip logging for health checks to reduce noise
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency = start.elapsed();
    let status = response.status().as_u16();

    if latency > config.slow_request {
        warn!(
            method = %method,
            path = %path,
            status = status,
            latency_ms = latency.as_millis(),
            threshold_ms = config.slow_request.as_millis(),
            "Slow request"
        );
    } else if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status = status,
            latency_ms = latency.as_millis(),
            "Request failed (5xx)"
        );
    } else if status >= 400 {
        info!(
            method = %method,
            path = %path,
            status = status,
            latency_ms = latency.as_millis(),
            "Request completed (4xx)"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = status,
            latency_ms = latency.as_millis(),
            "Request completed"
        );
    }

    response
}
