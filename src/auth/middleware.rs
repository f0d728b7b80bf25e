//! Authentication Middleware
//! Mission: Classify every request and attach the resolved identity

use crate::auth::{
    codec::{is_bearer_style, split_bearer},
    error::AuthError,
    jwt::is_expired,
    models::Claims,
    service::AuthService,
};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};

/// Request classifier. Runs before the guards.
///
/// Anonymous requests and requests with malformed or unverifiable bearer
/// tokens continue without an identity; the guards decide whether that is
/// acceptable. Revoked tokens and correctly signed but expired tokens are
/// rejected here.
pub async fn bearer_token_middleware(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    if let Some(claims) = classify(&auth, header.as_deref()).await? {
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}

/// Resolve an `Authorization` header value into an identity, if any
pub async fn classify(
    auth: &AuthService,
    header: Option<&str>,
) -> Result<Option<Claims>, AuthError> {
    let Some(raw) = header else {
        return Ok(None);
    };
    if !is_bearer_style(raw) {
        return Ok(None);
    }

    let Ok(token) = split_bearer(raw) else {
        debug!("Malformed bearer header, continuing without identity");
        return Ok(None);
    };

    if auth.cache().is_blocked(token).await {
        warn!("Rejected revoked token");
        return Err(AuthError::TokenRevoked);
    }

    let now = Utc::now().timestamp();

    // only ever populated below, after a successful verification of this exact token
    if let Some(claims) = auth.cache().validated(token).await {
        if claims.seconds_to_expiry(now) > 0 {
            return Ok(Some(claims));
        }
    }

    match auth.jwt().verify_declared(token) {
        Ok(claims) => {
            auth.cache()
                .remember_validated(token, claims.clone(), now)
                .await;
            Ok(Some(claims))
        }
        Err(e) if is_expired(&e) => {
            debug!("Rejected expired token");
            Err(AuthError::TokenExpired)
        }
        Err(e) => {
            debug!(error = %e, "Unverifiable bearer token, continuing without identity");
            Ok(None)
        }
    }
}

/// Extract claims from request (use after the classifier)
pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        jwt::JwtHandler,
        models::{Role, TokenKind},
        revocation::RevocationCache,
        user_store::{UserDirectory, UserStore},
    };
    use axum::body::Body;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Arc;

    const ACCESS_SECRET: &str = "classifier-access";
    const REFRESH_SECRET: &str = "classifier-refresh";

    fn service() -> AuthService {
        let users: Arc<dyn UserDirectory> = Arc::new(UserStore::in_memory().unwrap());
        let jwt = Arc::new(JwtHandler::new(
            ACCESS_SECRET.to_string(),
            REFRESH_SECRET.to_string(),
        ));
        AuthService::new(users, jwt, RevocationCache::in_memory(), 4)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let auth = service();
        assert!(classify(&auth, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_anonymous() {
        let auth = service();
        let result = classify(&auth, Some("Basic YWxpY2U6cHc=")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_malformed_bearer_falls_through() {
        let auth = service();
        for raw in ["Bearer", "Bearer a b", "Bearer not-a-jwt"] {
            assert!(classify(&auth, Some(raw)).await.unwrap().is_none(), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_valid_token_resolves_and_is_cached() {
        let auth = service();
        let token = auth.issue_token(11, Role::PaidUser, false).unwrap();

        let claims = classify(&auth, Some(&bearer(&token))).await.unwrap().unwrap();
        assert_eq!(claims.sub, 11);
        assert_eq!(claims.role, Role::PaidUser);
        assert_eq!(auth.cache().validated(&token).await, Some(claims));
    }

    #[tokio::test]
    async fn test_refresh_token_resolves_too() {
        let auth = service();
        let token = auth.issue_token(11, Role::User, true).unwrap();
        let claims = classify(&auth, Some(&bearer(&token))).await.unwrap().unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn test_revoked_token_rejected_even_when_cached() {
        let auth = service();
        let token = auth.issue_token(11, Role::User, false).unwrap();
        classify(&auth, Some(&bearer(&token))).await.unwrap();

        auth.revoke(&token).await.unwrap();
        assert!(matches!(
            classify(&auth, Some(&bearer(&token))).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_revoked_forged_token_rejected_before_signature_check() {
        let auth = service();
        let forged = JwtHandler::new("x".to_string(), "y".to_string())
            .issue(1, Role::Admin, TokenKind::Access)
            .unwrap();

        // unverifiable, so anonymous
        assert!(classify(&auth, Some(&bearer(&forged))).await.unwrap().is_none());

        auth.revoke(&forged).await.unwrap();
        assert!(matches!(
            classify(&auth, Some(&bearer(&forged))).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_hard_rejection() {
        let auth = service();
        let now = Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: 1,
            role: Role::User,
            kind: TokenKind::Access,
            iat: now - 600,
            exp: now - 60,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            classify(&auth, Some(&bearer(&token))).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_forged_kind_falls_through() {
        let auth = service();
        let now = Utc::now().timestamp() as u64;
        // signed with the access secret, declares refresh
        let claims = Claims {
            sub: 1,
            role: Role::Admin,
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(classify(&auth, Some(&bearer(&token))).await.unwrap().is_none());
        assert!(auth.cache().validated(&token).await.is_none());
    }

    #[test]
    fn test_extract_claims_from_request() {
        let mut req = Request::new(Body::empty());
        assert!(extract_claims(&req).is_none());

        req.extensions_mut().insert(Claims {
            sub: 5,
            role: Role::User,
            kind: TokenKind::Access,
            iat: 0,
            exp: 1,
        });
        assert_eq!(extract_claims(&req).unwrap().sub, 5);
    }
}
