//! Authentication API Endpoints
//! Mission: Register, login, token rotation and token blocking over HTTP

use crate::auth::{
    error::AuthError,
    middleware::extract_claims,
    models::{AccessTokenResponse, BlockTokenRequest, Claims, TokenPair, UserResponse},
    service::AuthService,
};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

fn authorization(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MalformedCredential)
}

/// Register endpoint - POST /auth/register (Basic credentials)
pub async fn register(
    State(auth): State<AuthService>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = auth.register(authorization(&headers)?).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Login endpoint - POST /auth/login (Basic credentials)
pub async fn login(
    State(auth): State<AuthService>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = auth.login(authorization(&headers)?).await?;
    Ok(Json(pair))
}

/// Rotate access token - POST /auth/token/access (Bearer refresh token)
pub async fn rotate_access_token(
    State(auth): State<AuthService>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>, AuthError> {
    let access_token = auth
        .rotate_access_token(authorization(&headers)?)
        .await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// Block a token - POST /auth/token/block
pub async fn block_token(
    State(auth): State<AuthService>,
    Json(payload): Json<BlockTokenRequest>,
) -> Result<Json<Value>, AuthError> {
    auth.revoke(&payload.token).await?;
    Ok(Json(json!({ "blocked": true })))
}

/// Resolved identity - GET /auth/private
pub async fn private(req: Request) -> Result<Json<Claims>, AuthError> {
    let claims = extract_claims(&req).ok_or(AuthError::Unauthorized)?;
    info!(user_id = claims.sub, "Private endpoint accessed");
    Ok(Json(claims.clone()))
}
