//! Tracker sets: bulk invalidation for paginated read caches.
//!
//! Every cached page of a grouping is recorded as a member of the grouping's
//! tracker set. Invalidating the grouping deletes all members together with
//! the tracker itself.

use std::sync::Arc;
use std::time::Duration;

use super::service::{CacheError, CacheService};

#[derive(Clone)]
pub struct TrackerSet {
    cache: Arc<dyn CacheService>,
}

impl TrackerSet {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }

    /// Record `member` under `tracker_key`. The tracker's expiry is pushed to
    /// `ttl` from now, so it always outlives members cached with the same TTL.
    pub async fn track(
        &self,
        tracker_key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.cache
            .add_to_set(tracker_key, &[member.to_string()], ttl)
            .await
    }

    /// Delete every tracked key plus the tracker in one batch. Returns the
    /// number of keys deleted; an empty tracker costs a single read and no
    /// delete.
    pub async fn invalidate(&self, tracker_key: &str) -> Result<usize, CacheError> {
        let mut keys = self.cache.get_set_members(tracker_key).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        keys.push(tracker_key.to_string());
        self.cache.delete_keys(&keys).await?;
        Ok(keys.len())
    }
}
