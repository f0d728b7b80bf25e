//! Per-identity throttling middleware.
//!
//! In-memory fixed-window counters keyed by subject id and matched route.
//! Only routes whose policy carries a [`ThrottleRule`] are counted, and only
//! for requests that resolved an identity.

use crate::auth::{
    error::AuthError,
    guards::route_policy,
    middleware::extract_claims,
    policy::{RouteTable, ThrottleRule},
};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Throttle state tracking requests per (subject, route).
#[derive(Clone)]
pub struct ThrottleLayer {
    routes: Arc<RouteTable>,
    state: Arc<Mutex<HashMap<(i64, String), ThrottleEntry>>>,
}

struct ThrottleEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum ThrottleResult {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl ThrottleLayer {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self {
            routes,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request and decide whether it may proceed.
    fn check(&self, subject: i64, route: &str, rule: ThrottleRule) -> ThrottleResult {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state
            .entry((subject, route.to_string()))
            .or_insert(ThrottleEntry {
                count: 0,
                window_start: now,
                window: rule.window,
            });

        // Reset window if expired
        if now.duration_since(entry.window_start) >= rule.window {
            entry.count = 0;
            entry.window_start = now;
        }
        entry.window = rule.window;
        entry.count += 1;

        if entry.count > rule.max_requests {
            let reset_at = entry.window_start + rule.window;
            ThrottleResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else {
            ThrottleResult::Allowed {
                remaining: rule.max_requests - entry.count,
            }
        }
    }

    /// Periodic cleanup of old entries (call from a background task).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.retain(|_, entry| now.duration_since(entry.window_start) < entry.window * 2);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.state.lock().len()
    }
}

/// Throttle middleware function. Runs after the guards.
pub async fn throttle_middleware(
    State(limiter): State<ThrottleLayer>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let policy = route_policy(&limiter.routes, &request);
    let subject = extract_claims(&request).map(|claims| claims.sub);
    let (Some(rule), Some(subject)) = (policy.throttle, subject) else {
        return Ok(next.run(request).await);
    };

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match limiter.check(subject, &route, rule) {
        ThrottleResult::Allowed { remaining } => {
            debug!(user_id = subject, route = %route, remaining, "Throttle budget");
            Ok(next.run(request).await)
        }
        ThrottleResult::Exceeded { retry_after } => {
            warn!(
                user_id = subject,
                route = %route,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            Err(AuthError::TooManyRequests {
                retry_after: retry_after.max(Duration::from_secs(1)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> ThrottleLayer {
        ThrottleLayer::new(Arc::new(RouteTable::new()))
    }

    #[test]
    fn test_throttle_allows_under_limit() {
        let limiter = limiter();
        let rule = ThrottleRule::per_minute(3);

        assert_eq!(limiter.check(1, "/users/me", rule), ThrottleResult::Allowed { remaining: 2 });
        assert_eq!(limiter.check(1, "/users/me", rule), ThrottleResult::Allowed { remaining: 1 });
        assert_eq!(limiter.check(1, "/users/me", rule), ThrottleResult::Allowed { remaining: 0 });
        assert!(matches!(
            limiter.check(1, "/users/me", rule),
            ThrottleResult::Exceeded { .. }
        ));
    }

    #[test]
    fn test_throttle_is_per_subject_and_route() {
        let limiter = limiter();
        let rule = ThrottleRule::per_minute(1);

        assert!(matches!(limiter.check(1, "/a", rule), ThrottleResult::Allowed { .. }));
        assert!(matches!(limiter.check(2, "/a", rule), ThrottleResult::Allowed { .. }));
        assert!(matches!(limiter.check(1, "/b", rule), ThrottleResult::Allowed { .. }));
        assert!(matches!(limiter.check(1, "/a", rule), ThrottleResult::Exceeded { .. }));
    }

    #[test]
    fn test_throttle_window_resets() {
        let limiter = limiter();
        let rule = ThrottleRule {
            max_requests: 1,
            window: Duration::from_millis(30),
        };

        assert!(matches!(limiter.check(1, "/a", rule), ThrottleResult::Allowed { .. }));
        assert!(matches!(limiter.check(1, "/a", rule), ThrottleResult::Exceeded { .. }));
        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(limiter.check(1, "/a", rule), ThrottleResult::Allowed { .. }));
    }

    #[test]
    fn test_cleanup_drops_stale_windows() {
        let limiter = limiter();
        let rule = ThrottleRule {
            max_requests: 5,
            window: Duration::from_millis(10),
        };
        limiter.check(1, "/a", rule);
        assert_eq!(limiter.tracked(), 1);

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup();
        assert_eq!(limiter.tracked(), 0);
    }
}
