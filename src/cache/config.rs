//! Cache configuration.
//!
//! Controls the cache backend, per-entity TTLs and operation timeouts via the
//! `[cache]` section of `chorus.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_POST_TTL_SECS: u64 = 300;
const DEFAULT_COMMENT_TTL_SECS: u64 = 120;
const DEFAULT_COMMENT_LIST_TTL_SECS: u64 = 60;
const DEFAULT_INTERACTION_TTL_SECS: u64 = 120;
const DEFAULT_USER_TTL_SECS: u64 = 600;
const DEFAULT_TOKEN_TTL_SECS: u64 = 60;

/// Cache configuration from `chorus.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection URL. The in-process cache is used when unset.
    pub redis_url: Option<String>,
    /// Maximum keys held by the in-process cache.
    pub memory_capacity: usize,
    /// Upper bound (ms) for any single cache round trip.
    pub op_timeout_ms: u64,
    /// TTL (s) for cached posts.
    pub post_ttl_secs: u64,
    /// TTL (s) for cached comments.
    pub comment_ttl_secs: u64,
    /// TTL (s) for cached comment pages and their tracker sets.
    pub comment_list_ttl_secs: u64,
    /// TTL (s) for cached interactions.
    pub interaction_ttl_secs: u64,
    /// TTL (s) for cached users.
    pub user_ttl_secs: u64,
    /// TTL (s) for cached tokens.
    pub token_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            op_timeout_ms: DEFAULT_OP_TIMEOUT_MS,
            post_ttl_secs: DEFAULT_POST_TTL_SECS,
            comment_ttl_secs: DEFAULT_COMMENT_TTL_SECS,
            comment_list_ttl_secs: DEFAULT_COMMENT_LIST_TTL_SECS,
            interaction_ttl_secs: DEFAULT_INTERACTION_TTL_SECS,
            user_ttl_secs: DEFAULT_USER_TTL_SECS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            redis_url: settings.redis_url.clone(),
            memory_capacity: settings.memory_capacity.get(),
            op_timeout_ms: settings.op_timeout.as_millis() as u64,
            post_ttl_secs: settings.post_ttl.as_secs(),
            comment_ttl_secs: settings.comment_ttl.as_secs(),
            comment_list_ttl_secs: settings.comment_list_ttl.as_secs(),
            interaction_ttl_secs: settings.interaction_ttl.as_secs(),
            user_ttl_secs: settings.user_ttl.as_secs(),
            token_ttl_secs: settings.token_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms.max(1))
    }

    pub fn post_ttl(&self) -> Duration {
        ttl(self.post_ttl_secs)
    }

    pub fn comment_ttl(&self) -> Duration {
        ttl(self.comment_ttl_secs)
    }

    pub fn comment_list_ttl(&self) -> Duration {
        ttl(self.comment_list_ttl_secs)
    }

    pub fn interaction_ttl(&self) -> Duration {
        ttl(self.interaction_ttl_secs)
    }

    pub fn user_ttl(&self) -> Duration {
        ttl(self.user_ttl_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        ttl(self.token_ttl_secs)
    }
}

// Zero would mean "never expires" on some backends; clamp to one second.
fn ttl(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
