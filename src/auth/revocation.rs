//! Revocation Cache
//! Mission: Shared TTL store for blocked tokens and recently verified claims

use crate::auth::{jwt::REFRESH_TOKEN_TTL_SECS, models::Claims};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const BLOCK_PREFIX: &str = "BLOCK_";
const VALIDATED_PREFIX: &str = "TOKEN_";

/// Shortest TTL ever written
pub const MIN_CACHE_TTL_SECS: i64 = 1;
/// Longest block ever written. No issued token lives longer.
pub const MAX_BLOCK_TTL_SECS: i64 = REFRESH_TOKEN_TTL_SECS;
/// Validated entries expire this long before the token does
pub const VALIDATED_SAFETY_MARGIN_SECS: i64 = 30;

/// Key-value store with per-key expiry. Every write is an unconditional set.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Claims>;
    async fn set(&self, key: &str, claims: Claims, ttl: Duration);
}

struct CacheEntry {
    claims: Claims,
    expires_at: Instant,
}

/// In-process cache. Expired entries are invisible to `get` and removed by
/// `purge_expired`.
#[derive(Default)]
pub struct MemoryTokenCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries (call from a background task)
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Purged expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn longest_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .map(|entry| entry.expires_at.saturating_duration_since(now))
            .max()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &str) -> Option<Claims> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.claims.clone())
    }

    async fn set(&self, key: &str, claims: Claims, ttl: Duration) {
        let entry = CacheEntry {
            claims,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), entry);
    }
}

/// Namespaced view over a [`TokenCache`]: `BLOCK_<token>` for revoked tokens,
/// `TOKEN_<token>` for claims that already passed verification.
#[derive(Clone)]
pub struct RevocationCache {
    store: Arc<dyn TokenCache>,
}

impl RevocationCache {
    pub fn new(store: Arc<dyn TokenCache>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenCache::new()))
    }

    /// Block `token` for `seconds_to_expiry` seconds, clamped to
    /// `[1, MAX_BLOCK_TTL_SECS]`
    pub async fn block(&self, token: &str, claims: Claims, now: i64) {
        let ttl = block_ttl_secs(claims.seconds_to_expiry(now));
        debug!(sub = claims.sub, ttl_secs = ttl, "Blocking token");
        self.store
            .set(&blocked_key(token), claims, Duration::from_secs(ttl as u64))
            .await;
    }

    pub async fn is_blocked(&self, token: &str) -> bool {
        self.store.get(&blocked_key(token)).await.is_some()
    }

    /// Remember verified claims until shortly before the token expires
    pub async fn remember_validated(&self, token: &str, claims: Claims, now: i64) {
        let ttl = validated_ttl_secs(claims.seconds_to_expiry(now));
        self.store
            .set(&validated_key(token), claims, Duration::from_secs(ttl as u64))
            .await;
    }

    pub async fn validated(&self, token: &str) -> Option<Claims> {
        self.store.get(&validated_key(token)).await
    }
}

fn blocked_key(token: &str) -> String {
    format!("{BLOCK_PREFIX}{token}")
}

fn validated_key(token: &str) -> String {
    format!("{VALIDATED_PREFIX}{token}")
}

pub fn block_ttl_secs(seconds_to_expiry: i64) -> i64 {
    seconds_to_expiry.clamp(MIN_CACHE_TTL_SECS, MAX_BLOCK_TTL_SECS)
}

pub fn validated_ttl_secs(seconds_to_expiry: i64) -> i64 {
    (seconds_to_expiry - VALIDATED_SAFETY_MARGIN_SECS).max(MIN_CACHE_TTL_SECS)
}
