//! Route access policies
//!
//! Each route is registered with an explicit policy record. The guard stages
//! look the record up by method and matched path pattern.

use crate::auth::models::Role;
use axum::http::Method;
use std::collections::HashMap;
use std::time::Duration;

/// Fixed-window request budget per identity per route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl ThrottleRule {
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub public: bool,
    pub required_role: Option<Role>,
    pub throttle: Option<ThrottleRule>,
}

impl RoutePolicy {
    /// Reachable without an identity
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    /// Any resolved identity
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// A resolved identity with exactly `role`
    pub fn role(role: Role) -> Self {
        Self {
            required_role: Some(role),
            ..Self::default()
        }
    }

    pub fn throttled(mut self, rule: ThrottleRule) -> Self {
        self.throttle = Some(rule);
        self
    }
}

/// Map from `(method, path pattern)` to policy. Unknown routes get the
/// default policy: not public, no role.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(Method, String), RoutePolicy>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, path: &str, policy: RoutePolicy) {
        self.routes.insert((method, path.to_string()), policy);
    }

    pub fn with(mut self, method: Method, path: &str, policy: RoutePolicy) -> Self {
        self.insert(method, path, policy);
        self
    }

    pub fn policy(&self, method: &Method, path: &str) -> RoutePolicy {
        self.routes
            .get(&(method.clone(), path.to_string()))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_method_and_pattern() {
        let table = RouteTable::new()
            .with(Method::POST, "/auth/login", RoutePolicy::public())
            .with(Method::GET, "/users", RoutePolicy::role(Role::Admin))
            .with(
                Method::GET,
                "/users/me",
                RoutePolicy::authenticated().throttled(ThrottleRule::per_minute(5)),
            );

        assert!(table.policy(&Method::POST, "/auth/login").public);
        assert!(!table.policy(&Method::GET, "/auth/login").public);
        assert_eq!(
            table.policy(&Method::GET, "/users").required_role,
            Some(Role::Admin)
        );
        assert_eq!(
            table.policy(&Method::GET, "/users/me").throttle,
            Some(ThrottleRule::per_minute(5))
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_unknown_route_is_protected() {
        let table = RouteTable::new();
        let policy = table.policy(&Method::GET, "/movies");
        assert!(!policy.public);
        assert!(policy.required_role.is_none());
        assert!(policy.throttle.is_none());
    }
}
