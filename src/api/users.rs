use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::info;

use crate::auth::{middleware::extract_claims, models::UserResponse, AuthService};

/// Current user profile - GET /users/me
pub async fn me(
    State(auth): State<AuthService>,
    req: Request,
) -> Result<Json<UserResponse>, ApiError> {
    let claims = extract_claims(&req).ok_or(ApiError::Unauthorized)?;
    auth.users()
        .find_by_id(claims.sub)
        .await?
        .map(|user| Json(UserResponse::from_user(&user)))
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", claims.sub)))
}

/// List all users - GET /users (admin)
pub async fn list_users(
    State(auth): State<AuthService>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = auth.users().list().await?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Delete a user - DELETE /users/:id (admin)
pub async fn delete_user(
    State(auth): State<AuthService>,
    Path(id): Path<i64>,
    req: Request,
) -> Result<StatusCode, ApiError> {
    let claims = extract_claims(&req).ok_or(ApiError::Unauthorized)?;
    if claims.sub == id {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }

    if !auth.users().delete(id).await? {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    info!(admin_id = claims.sub, user_id = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Database(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Unauthorized,
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
