//! JWT Token Handler
//! Mission: Mint and verify access/refresh tokens with independent secrets

use crate::auth::models::{Claims, Role, TokenKind};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use tracing::debug;

/// Access tokens live for five minutes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 300;
/// Refresh tokens live for a day
pub const REFRESH_TOKEN_TTL_SECS: i64 = 24 * 3600;

/// JWT Handler for token operations
pub struct JwtHandler {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with one secret per token kind
    pub fn new(access_secret: String, refresh_secret: String) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_ttl_secs: REFRESH_TOKEN_TTL_SECS,
        }
    }

    /// Override token lifetimes
    pub fn with_lifetimes(mut self, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }

    pub fn lifetime_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    /// Sign a token of `kind` for the given subject and role
    pub fn issue(&self, subject: i64, role: Role, kind: TokenKind) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(self.lifetime_secs(kind))
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: subject,
            role,
            kind,
            iat: now.max(0) as u64,
            exp: exp.max(0) as u64,
        };

        debug!(
            "Generating {} JWT for user {} ({}), expires in {}s",
            kind.as_str(),
            subject,
            role.as_str(),
            self.lifetime_secs(kind)
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .context("Failed to generate JWT")
    }

    /// Verify signature and expiry against the secret of `kind`
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &validation,
        )?;

        debug!(
            "Validated {} JWT for user {}",
            decoded.claims.kind.as_str(),
            decoded.claims.sub
        );

        Ok(decoded.claims)
    }

    /// Peek at the declared kind without trusting it, then verify with the
    /// secret that kind implies. A forged kind is checked against the wrong
    /// secret and fails.
    pub fn verify_declared(&self, token: &str) -> Result<Claims, JwtError> {
        let declared = decode_unverified(token)?.kind;
        self.verify(token, declared)
    }
}

/// Decode claims without checking signature or expiry
pub fn decode_unverified(token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).map(|d| d.claims)
}

/// True when the verification failure is a correctly signed token past `exp`
pub fn is_expired(err: &JwtError) -> bool {
    matches!(
        err.kind(),
        jsonwebtoken::errors::ErrorKind::ExpiredSignature
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> JwtHandler {
        JwtHandler::new("access-secret-12345".to_string(), "refresh-secret-67890".to_string())
    }

    fn expired_token(secret: &str, kind: TokenKind) -> String {
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: 1,
            role: Role::User,
            kind,
            iat: now - 600,
            exp: now - 300,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_kinds_and_secrets() {
        let handler = handler();

        let access = handler.issue(42, Role::PaidUser, TokenKind::Access).unwrap();
        let refresh = handler.issue(42, Role::PaidUser, TokenKind::Refresh).unwrap();
        assert_ne!(access, refresh);

        let claims = handler.verify(&access, TokenKind::Access).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::PaidUser);
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS as u64);

        let claims = handler.verify(&refresh, TokenKind::Refresh).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, REFRESH_TOKEN_TTL_SECS as u64);

        // each kind is signed with its own secret
        assert!(handler.verify(&access, TokenKind::Refresh).is_err());
        assert!(handler.verify(&refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn test_decode_unverified_ignores_signature_and_expiry() {
        let token = expired_token("some-other-secret", TokenKind::Refresh);
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(decode_unverified("not.a.jwt").is_err());
    }

    #[test]
    fn test_verify_declared_selects_secret_by_kind() {
        let handler = handler();
        let refresh = handler.issue(5, Role::User, TokenKind::Refresh).unwrap();
        let claims = handler.verify_declared(&refresh).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn test_forged_kind_fails_verification() {
        let handler = handler();
        // signed with the access secret but claims to be a refresh token
        let now = Utc::now().timestamp() as u64;
        let forged = Claims {
            sub: 1,
            role: Role::Admin,
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + 300,
        };
        let token = encode(
            &Header::default(),
            &forged,
            &EncodingKey::from_secret(b"access-secret-12345"),
        )
        .unwrap();

        let err = handler.verify_declared(&token).unwrap_err();
        assert!(!is_expired(&err));
    }

    #[test]
    fn test_expired_token_detected() {
        let handler = handler();
        let token = expired_token("access-secret-12345", TokenKind::Access);
        let err = handler.verify(&token, TokenKind::Access).unwrap_err();
        assert!(is_expired(&err));
    }

    #[test]
    fn test_expired_token_with_bad_signature_is_not_expiry() {
        let handler = handler();
        let token = expired_token("wrong-secret", TokenKind::Access);
        let err = handler.verify(&token, TokenKind::Access).unwrap_err();
        assert!(!is_expired(&err));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let handler = handler();
        assert!(handler.verify("invalid.token.here", TokenKind::Access).is_err());
        assert!(handler.verify_declared("invalid.token.here").is_err());
    }
}
