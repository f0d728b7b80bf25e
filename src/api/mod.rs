//! HTTP surface
//!
//! Every route is registered twice: once on the router and once in the
//! [`RouteTable`] the guard stages consult.

pub mod users;

use axum::{
    http::Method,
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{
    api as auth_api, auth_guard, bearer_token_middleware, rbac_guard, AuthService, Role,
    RoutePolicy, RouteTable, ThrottleRule,
};
use crate::middleware::{request_logging, throttle_middleware, LoggingConfig, ThrottleLayer};

/// Requests per minute per user on throttled routes
pub const PROFILE_REQUESTS_PER_MINUTE: u32 = 30;

/// Policies for every route [`build_router`] mounts
pub fn route_table() -> RouteTable {
    RouteTable::new()
        .with(Method::GET, "/health", RoutePolicy::public())
        .with(Method::POST, "/auth/register", RoutePolicy::public())
        .with(Method::POST, "/auth/login", RoutePolicy::public())
        .with(Method::POST, "/auth/token/access", RoutePolicy::authenticated())
        .with(Method::POST, "/auth/token/block", RoutePolicy::authenticated())
        .with(Method::GET, "/auth/private", RoutePolicy::authenticated())
        .with(
            Method::GET,
            "/users/me",
            RoutePolicy::authenticated()
                .throttled(ThrottleRule::per_minute(PROFILE_REQUESTS_PER_MINUTE)),
        )
        .with(Method::GET, "/users", RoutePolicy::role(Role::Admin))
        .with(Method::DELETE, "/users/:id", RoutePolicy::role(Role::Admin))
}

/// Create the application router with the default route table
pub fn build_router(auth: AuthService, logging: LoggingConfig) -> (Router, ThrottleLayer) {
    build_router_with(auth, logging, route_table())
}

/// Create the application router. The returned [`ThrottleLayer`] shares its
/// counters with the router so the caller can schedule `cleanup`.
pub fn build_router_with(
    auth: AuthService,
    logging: LoggingConfig,
    routes: RouteTable,
) -> (Router, ThrottleLayer) {
    let routes = Arc::new(routes);
    let throttle = ThrottleLayer::new(routes.clone());

    // route_layer: last added runs first
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/token/access", post(auth_api::rotate_access_token))
        .route("/auth/token/block", post(auth_api::block_token))
        .route("/auth/private", get(auth_api::private))
        .route("/users/me", get(users::me))
        .route("/users", get(users::list_users))
        .route("/users/:id", delete(users::delete_user))
        .route_layer(middleware::from_fn_with_state(
            throttle.clone(),
            throttle_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(routes.clone(), rbac_guard))
        .route_layer(middleware::from_fn_with_state(routes, auth_guard))
        .route_layer(middleware::from_fn_with_state(
            auth.clone(),
            bearer_token_middleware,
        ))
        .with_state(auth)
        .layer(middleware::from_fn_with_state(logging, request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    (app, throttle)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
