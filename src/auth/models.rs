//! Authentication Models
//! Mission: Define user identity, token claims and auth payloads

use serde::{Deserialize, Serialize};

/// User account as stored by the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub created_at: String,
}

/// User roles for RBAC. Compared by equality only, there is no ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "paid_user")]
    PaidUser,
    #[serde(rename = "user")]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::PaidUser => "paid_user",
            Role::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "paid_user" => Some(Role::PaidUser),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// Which secret and lifetime a token was minted with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenKind {
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "refresh")]
    Refresh,
}

impl TokenKind {
    pub fn from_refresh_flag(is_refresh: bool) -> Self {
        if is_refresh {
            TokenKind::Refresh
        } else {
            TokenKind::Access
        }
    }

    pub fn is_refresh(&self) -> bool {
        matches!(self, TokenKind::Refresh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT Claims payload, also the resolved identity attached to a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64, // subject (user id)
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: u64,
    pub exp: u64, // expiration timestamp (seconds)
}

impl Claims {
    /// Seconds until `exp`, negative once expired. Saturates, since `exp`
    /// may come from an unverified payload.
    pub fn seconds_to_expiry(&self, now: i64) -> i64 {
        i64::try_from(self.exp)
            .unwrap_or(i64::MAX)
            .saturating_sub(now)
    }
}

/// Identifier/secret pair decoded from a `Basic` header. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredential {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Access token rotation response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Token block request body
#[derive(Debug, Deserialize)]
pub struct BlockTokenRequest {
    pub token: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at.clone(),
        }
    }
}
