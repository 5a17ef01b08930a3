//! Read-through and invalidation helpers shared by the cached repositories.
//!
//! Cache faults never reach the caller: they are logged, counted and the
//! operation continues on the store path.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::application::repos::RepoError;

use super::keys::EntityKind;
use super::service::CacheService;
use super::tracker::TrackerSet;

pub const METRIC_CACHE_HIT: &str = "chorus_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "chorus_cache_miss_total";
pub const METRIC_CACHE_FAULT: &str = "chorus_cache_fault_total";
pub const METRIC_CACHE_INVALIDATED: &str = "chorus_cache_invalidated_keys_total";

#[derive(Clone)]
pub struct CacheLayer {
    cache: Arc<dyn CacheService>,
    entity: EntityKind,
}

impl CacheLayer {
    pub fn new(cache: Arc<dyn CacheService>, entity: EntityKind) -> Self {
        Self { cache, entity }
    }

    pub fn tracker(&self) -> TrackerSet {
        TrackerSet::new(self.cache.clone())
    }

    /// Cached value for `key`, or `None` on a miss or any cache fault.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT, "entity" => self.entity.as_str()).increment(1);
                    Some(value)
                }
                Err(err) => {
                    self.fault("decode", key, &err);
                    None
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "entity" => self.entity.as_str()).increment(1);
                None
            }
            Err(err) => {
                self.fault("get", key, &err);
                None
            }
        }
    }

    /// Best-effort write. Returns whether the value landed in the cache.
    pub async fn fill<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.fault("encode", key, &err);
                return false;
            }
        };
        match self.cache.set(key, payload, ttl).await {
            Ok(()) => true,
            Err(err) => {
                self.fault("set", key, &err);
                false
            }
        }
    }

    /// Point lookup through the cache. Store errors pass through unchanged;
    /// only found records are cached.
    pub async fn read_through<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, RepoError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, RepoError>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(Some(hit));
        }
        let loaded = load().await?;
        if let Some(value) = loaded.as_ref() {
            self.fill(key, value, ttl).await;
        }
        Ok(loaded)
    }

    /// Paginated read through the cache. The page key is registered with the
    /// tracker before the page is written, the reverse of write-then-track,
    /// and that order must be kept: a page written first can outlive an
    /// invalidation that runs before it is tracked. If registration fails the
    /// page is not cached at all.
    pub async fn read_through_tracked<T, F, Fut>(
        &self,
        tracker_key: &str,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<T, RepoError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }
        let loaded = load().await?;
        match self.tracker().track(tracker_key, key, ttl).await {
            Ok(()) => {
                self.fill(key, &loaded, ttl).await;
            }
            Err(err) => self.fault("add_to_set", tracker_key, &err),
        }
        Ok(loaded)
    }

    pub async fn invalidate(&self, key: &str) {
        match self.cache.delete(key).await {
            Ok(()) => {
                counter!(METRIC_CACHE_INVALIDATED, "entity" => self.entity.as_str()).increment(1)
            }
            Err(err) => self.fault("delete", key, &err),
        }
    }

    pub async fn invalidate_tracked(&self, tracker_key: &str) {
        match self.tracker().invalidate(tracker_key).await {
            Ok(0) => {}
            Ok(deleted) => counter!(METRIC_CACHE_INVALIDATED, "entity" => self.entity.as_str())
                .increment(deleted as u64),
            Err(err) => self.fault("invalidate_tracker", tracker_key, &err),
        }
    }

    fn fault(&self, op: &'static str, key: &str, err: &dyn Display) {
        counter!(METRIC_CACHE_FAULT, "entity" => self.entity.as_str(), "op" => op).increment(1);
        warn!(
            entity = self.entity.as_str(),
            op,
            key,
            error = %err,
            "Cache operation failed; continuing without cache"
        );
    }
}
