//! The key/value cache contract every backend implements.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache operation `{op}` timed out after {limit:?}")]
    Timeout { op: &'static str, limit: Duration },
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key/value store with per-key TTL and set primitives.
///
/// A missing key is `Ok(None)` (or an empty set), never an error.
#[async_trait]
pub trait CacheService: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Add `members` to the set at `key` and push the set's expiry out to
    /// `ttl` from now.
    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn get_set_members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Delete every key in one round trip.
    async fn delete_keys(&self, keys: &[String]) -> Result<(), CacheError>;
}
