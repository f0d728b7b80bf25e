//! Process configuration
//!
//! Everything is read from the environment (optionally seeded from `.env`).
//! Token secrets are mandatory: a missing secret stops the process at startup.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DB_PATH: &str = "marquee_auth.db";
pub const DEFAULT_SLOW_REQUEST_MS: u64 = 1000;
pub const DEFAULT_CACHE_SWEEP_SECS: u64 = 60;

/// Admin account created at startup when absent
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// bcrypt cost
    pub hash_rounds: u32,
    pub db_path: String,
    pub bind_addr: String,
    /// Requests slower than this are logged at WARN
    pub slow_request: Duration,
    pub cache_sweep_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_token_secret =
            non_empty("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET must be set")?;
        let refresh_token_secret =
            non_empty("REFRESH_TOKEN_SECRET").context("REFRESH_TOKEN_SECRET must be set")?;

        let hash_rounds = match non_empty("HASH_ROUNDS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid HASH_ROUNDS: {raw}"))?,
            None => bcrypt::DEFAULT_COST,
        };
        if !(4..=31).contains(&hash_rounds) {
            bail!("HASH_ROUNDS must be between 4 and 31, got {hash_rounds}");
        }

        let slow_request_ms = non_empty("SLOW_REQUEST_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_SLOW_REQUEST_MS);

        let cache_sweep_secs = non_empty("CACHE_SWEEP_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_CACHE_SWEEP_SECS);

        let bootstrap_admin = match (
            non_empty("BOOTSTRAP_ADMIN_EMAIL"),
            non_empty("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            hash_rounds,
            db_path: non_empty("AUTH_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            slow_request: Duration::from_millis(slow_request_ms),
            cache_sweep_interval: Duration::from_secs(cache_sweep_secs),
            bootstrap_admin,
        })
    }
}

/// Load `.env` from the working directory (and parents), then from the crate root.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "a"),
            ("REFRESH_TOKEN_SECRET", "r"),
        ]))
        .unwrap();

        assert_eq!(config.hash_rounds, bcrypt::DEFAULT_COST);
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.slow_request, Duration::from_millis(1000));
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("ACCESS_TOKEN_SECRET", "a")])).unwrap_err();
        assert!(err.to_string().contains("REFRESH_TOKEN_SECRET"));

        let err = AppConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "  "),
            ("REFRESH_TOKEN_SECRET", "r"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_SECRET"));
    }

    #[test]
    fn test_hash_rounds_validated() {
        let base = [("ACCESS_TOKEN_SECRET", "a"), ("REFRESH_TOKEN_SECRET", "r")];

        let mut pairs = base.to_vec();
        pairs.push(("HASH_ROUNDS", "10"));
        assert_eq!(AppConfig::from_lookup(lookup(&pairs)).unwrap().hash_rounds, 10);

        let mut pairs = base.to_vec();
        pairs.push(("HASH_ROUNDS", "2"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = base.to_vec();
        pairs.push(("HASH_ROUNDS", "ten"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_bootstrap_admin_requires_both_fields() {
        let config = AppConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "a"),
            ("REFRESH_TOKEN_SECRET", "r"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
        ]))
        .unwrap();
        assert!(config.bootstrap_admin.is_none());

        let config = AppConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "a"),
            ("REFRESH_TOKEN_SECRET", "r"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme"),
        ]))
        .unwrap();
        assert_eq!(config.bootstrap_admin.unwrap().email, "root@example.com");
    }
}
