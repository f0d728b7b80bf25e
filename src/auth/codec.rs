//! Credential Codec
//! Mission: Turn raw `Authorization` header values into typed credentials

use crate::auth::{error::AuthError, models::BasicCredential};
use base64::{engine::general_purpose, Engine as _};

pub const BASIC_SCHEME: &str = "Basic";
pub const BEARER_SCHEME: &str = "Bearer";

/// Decode `Basic <base64(identifier:secret)>` into its two fields.
pub fn parse_basic_credential(raw: &str) -> Result<BasicCredential, AuthError> {
    let parts: Vec<&str> = raw.split(' ').collect();
    let [scheme, payload] = parts.as_slice() else {
        return Err(AuthError::MalformedCredential);
    };
    if *scheme != BASIC_SCHEME {
        return Err(AuthError::MalformedCredential);
    }

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AuthError::MalformedCredential)?;
    let decoded = String::from_utf8(bytes).map_err(|_| AuthError::MalformedCredential)?;

    let fields: Vec<&str> = decoded.split(':').collect();
    let [email, password] = fields.as_slice() else {
        return Err(AuthError::MalformedCredential);
    };

    Ok(BasicCredential {
        email: email.to_string(),
        password: password.to_string(),
    })
}

/// Validate `Bearer <token>` shape and return the token part.
pub fn split_bearer(raw: &str) -> Result<&str, AuthError> {
    let parts: Vec<&str> = raw.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if *scheme == BEARER_SCHEME => Ok(*token),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// True when the header names the bearer scheme at all, malformed or not.
pub fn is_bearer_style(raw: &str) -> bool {
    raw.split(' ').next() == Some(BEARER_SCHEME)
}

/// Build a `Basic` header value. Used by clients and tests.
pub fn encode_basic_credential(email: &str, password: &str) -> String {
    let payload = general_purpose::STANDARD.encode(format!("{email}:{password}"));
    format!("{BASIC_SCHEME} {payload}")
}
