//! Auth error taxonomy and its HTTP mapping

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::error;

/// Errors produced by the credential codec, the authenticator service,
/// the request classifier and the guard stages.
#[derive(Debug)]
pub enum AuthError {
    /// Header shape invalid: wrong scheme, wrong part count, undecodable payload
    MalformedCredential,
    /// Registration against an existing identifier
    AlreadyExists,
    /// Login against an unknown identifier
    NotFound,
    /// Login with a wrong secret
    InvalidSecret,
    /// Refresh token where access is required, or vice versa
    WrongTokenKind,
    /// Signature or expiry failure on an explicit verification path
    TokenExpiredOrInvalid,
    /// Classifier saw a correctly signed but expired token
    TokenExpired,
    /// Token present in the revocation cache
    TokenRevoked,
    /// No identity on a protected route
    Unauthorized,
    /// Identity lacks the role the route requires
    Forbidden,
    /// Per-identity throttle exceeded
    TooManyRequests { retry_after: Duration },
    /// Store, signing or hashing failure. Detail is logged, never returned.
    Internal(anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedCredential
            | AuthError::AlreadyExists
            | AuthError::NotFound
            | AuthError::InvalidSecret
            | AuthError::WrongTokenKind => StatusCode::BAD_REQUEST,
            AuthError::TokenExpiredOrInvalid
            | AuthError::TokenExpired
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::TokenRevoked | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::AlreadyExists => "already_exists",
            // same code as InvalidSecret so callers cannot probe for accounts
            AuthError::NotFound | AuthError::InvalidSecret => "invalid_credentials",
            AuthError::WrongTokenKind => "wrong_token_kind",
            AuthError::TokenExpiredOrInvalid => "token_expired_or_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Forbidden => "forbidden",
            AuthError::TooManyRequests { .. } => "rate_limit_exceeded",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MalformedCredential => write!(f, "Invalid Authorization header"),
            AuthError::AlreadyExists => write!(f, "User already exists"),
            AuthError::NotFound | AuthError::InvalidSecret => {
                write!(f, "Invalid email or password")
            }
            AuthError::WrongTokenKind => write!(f, "Wrong token type for this operation"),
            AuthError::TokenExpiredOrInvalid => write!(f, "Token is expired or invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenRevoked => write!(f, "Token has been revoked"),
            AuthError::Unauthorized => write!(f, "Authentication required"),
            AuthError::Forbidden => write!(f, "Insufficient permissions"),
            AuthError::TooManyRequests { .. } => write!(f, "Too many requests. Please slow down."),
            AuthError::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(err) = &self {
            error!(error = %format!("{err:#}"), "Auth internal error");
        }

        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let AuthError::TooManyRequests { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
