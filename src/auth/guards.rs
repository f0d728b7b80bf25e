//! Guard stages
//!
//! Authentication gate first, role gate second. The role comparison needs
//! the identity the first gate insists on.

use crate::auth::{
    error::AuthError,
    middleware::extract_claims,
    models::Claims,
    policy::{RoutePolicy, RouteTable},
};
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Public routes always pass; everything else needs a resolved identity.
pub fn check_authenticated(policy: &RoutePolicy, claims: Option<&Claims>) -> Result<(), AuthError> {
    if policy.public || claims.is_some() {
        Ok(())
    } else {
        Err(AuthError::Unauthorized)
    }
}

/// Routes without a role tag always pass; otherwise roles must be equal.
pub fn check_role(policy: &RoutePolicy, claims: Option<&Claims>) -> Result<(), AuthError> {
    match (policy.required_role, claims) {
        (None, _) => Ok(()),
        (Some(required), Some(claims)) if claims.role == required => Ok(()),
        _ => Err(AuthError::Forbidden),
    }
}

/// Look up the policy for the route that matched this request
pub fn route_policy(routes: &RouteTable, req: &Request) -> RoutePolicy {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str())
        .unwrap_or_else(|| req.uri().path());
    routes.policy(req.method(), path)
}

pub async fn auth_guard(
    State(routes): State<Arc<RouteTable>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let policy = route_policy(&routes, &req);
    if let Err(e) = check_authenticated(&policy, extract_claims(&req)) {
        debug!(
            method = %req.method(),
            path = %req.uri().path(),
            "Rejected unauthenticated request"
        );
        return Err(e);
    }
    Ok(next.run(req).await)
}

pub async fn rbac_guard(
    State(routes): State<Arc<RouteTable>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let policy = route_policy(&routes, &req);
    if let Err(e) = check_role(&policy, extract_claims(&req)) {
        debug!(
            method = %req.method(),
            path = %req.uri().path(),
            required = ?policy.required_role,
            "Rejected request lacking role"
        );
        return Err(e);
    }
    Ok(next.run(req).await)
}
