//! Authenticator Service
//! Mission: Register, log in, issue, verify, rotate and revoke tokens

use crate::auth::{
    codec::{parse_basic_credential, split_bearer},
    error::AuthError,
    jwt::{decode_unverified, JwtHandler},
    models::{Claims, Role, TokenKind, TokenPair, User},
    revocation::RevocationCache,
    user_store::UserDirectory,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Composes the credential codec, token issuer, revocation cache and user
/// directory. Errors go straight back to the caller.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    jwt: Arc<JwtHandler>,
    cache: RevocationCache,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        jwt: Arc<JwtHandler>,
        cache: RevocationCache,
        hash_cost: u32,
    ) -> Self {
        Self {
            users,
            jwt,
            cache,
            hash_cost,
        }
    }

    pub fn users(&self) -> &Arc<dyn UserDirectory> {
        &self.users
    }

    pub fn jwt(&self) -> &Arc<JwtHandler> {
        &self.jwt
    }

    pub fn cache(&self) -> &RevocationCache {
        &self.cache
    }

    /// Create a `user`-role account from a `Basic` header
    pub async fn register(&self, raw: &str) -> Result<User, AuthError> {
        let credential = parse_basic_credential(raw)?;

        if self.users.find_by_email(&credential.email).await?.is_some() {
            warn!("Registration rejected, user exists: {}", credential.email);
            return Err(AuthError::AlreadyExists);
        }

        let hash = self.hash_password(credential.password).await?;
        let user = self
            .users
            .create(&credential.email, &hash, Role::User)
            .await?;

        info!(user_id = user.id, "Registered user: {}", user.email);
        Ok(user)
    }

    /// Check a `Basic` header and return a fresh access/refresh pair
    pub async fn login(&self, raw: &str) -> Result<TokenPair, AuthError> {
        let credential = parse_basic_credential(raw)?;
        let user = self
            .authenticate(&credential.email, credential.password)
            .await?;

        let pair = TokenPair {
            access_token: self.issue_token(user.id, user.role, false)?,
            refresh_token: self.issue_token(user.id, user.role, true)?,
        };

        info!(
            user_id = user.id,
            role = user.role.as_str(),
            "Login successful: {}",
            user.email
        );
        Ok(pair)
    }

    /// Look up by email and compare the bcrypt hash
    pub async fn authenticate(&self, email: &str, password: String) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("Failed login attempt, unknown user: {}", email);
            return Err(AuthError::NotFound);
        };

        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("Password verification task failed")?
            .context("Failed to verify password")?;

        if !valid {
            warn!(user_id = user.id, "Failed login attempt, bad password");
            return Err(AuthError::InvalidSecret);
        }

        Ok(user)
    }

    pub fn issue_token(
        &self,
        subject: i64,
        role: Role,
        is_refresh: bool,
    ) -> Result<String, AuthError> {
        let kind = TokenKind::from_refresh_flag(is_refresh);
        Ok(self.jwt.issue(subject, role, kind)?)
    }

    /// Parse `Bearer <token>`, verify it with the secret its declared kind
    /// implies, then require that kind to match `expect_refresh`.
    pub fn parse_bearer_claim(&self, raw: &str, expect_refresh: bool) -> Result<Claims, AuthError> {
        let token = split_bearer(raw)?;

        let claims = self.jwt.verify_declared(token).map_err(|e| {
            debug!(error = %e, "Bearer token verification failed");
            AuthError::TokenExpiredOrInvalid
        })?;

        if claims.kind.is_refresh() != expect_refresh {
            return Err(AuthError::WrongTokenKind);
        }

        Ok(claims)
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// itself is not rotated.
    pub async fn rotate_access_token(&self, raw: &str) -> Result<String, AuthError> {
        let claims = self.parse_bearer_claim(raw, true)?;

        if self.cache.is_blocked(split_bearer(raw)?).await {
            return Err(AuthError::TokenRevoked);
        }

        debug!(user_id = claims.sub, "Rotating access token");
        self.issue_token(claims.sub, claims.role, false)
    }

    /// Block `token` until it would have expired anyway. The signature is not
    /// checked, only the payload has to decode.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = decode_unverified(token).map_err(|_| AuthError::MalformedCredential)?;
        let sub = claims.sub;
        self.cache.block(token, claims, Utc::now().timestamp()).await;

        info!(user_id = sub, "Token revoked");
        Ok(())
    }

    /// Create an admin account if `email` is not taken yet
    pub async fn ensure_admin(&self, email: &str, password: String) -> Result<User, AuthError> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            if existing.role != Role::Admin {
                warn!(
                    user_id = existing.id,
                    "Bootstrap admin email belongs to a non-admin account"
                );
            }
            return Ok(existing);
        }

        let hash = self.hash_password(password).await?;
        let admin = self.users.create(email, &hash, Role::Admin).await?;
        info!(user_id = admin.id, "Bootstrap admin created: {}", admin.email);
        Ok(admin)
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let cost = self.hash_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;
        Ok(hash)
    }
}
