//! In-process cache backend.
//!
//! LRU-bounded string values with lazily expired TTLs, plus tracker sets kept
//! outside the LRU so that a tracked page can never outlive its tracker.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};
use super::service::{CacheError, CacheService};

const SOURCE: &str = "cache::memory";
pub const METRIC_CACHE_EVICT: &str = "chorus_cache_evict_total";

struct Entry {
    value: String,
    expires_at: Instant,
}

struct TrackedSet {
    members: HashSet<String>,
    expires_at: Instant,
}

pub struct MemoryCacheService {
    values: RwLock<LruCache<String, Entry>>,
    sets: RwLock<HashMap<String, TrackedSet>>,
    set_sweep_threshold: usize,
}

impl MemoryCacheService {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.memory_capacity_non_zero())
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            values: RwLock::new(LruCache::new(capacity)),
            sets: RwLock::new(HashMap::new()),
            set_sweep_threshold: capacity.get(),
        }
    }

    /// True when `key` holds a live value or a live set.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        let value_live = rw_read(&self.values, SOURCE, "contains_key")
            .peek(key)
            .is_some_and(|entry| entry.expires_at > now);
        value_live
            || rw_read(&self.sets, SOURCE, "contains_key")
                .get(key)
                .is_some_and(|set| set.expires_at > now)
    }

    /// Number of stored values, including entries that expired but were not
    /// yet touched.
    pub fn len(&self) -> usize {
        rw_read(&self.values, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: &str) {
        rw_write(&self.values, SOURCE, "remove").pop(key);
        rw_write(&self.sets, SOURCE, "remove").remove(key);
    }
}

#[async_trait]
impl CacheService for MemoryCacheService {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut values = rw_write(&self.values, SOURCE, "get");
        match values.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        values.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let evicted = rw_write(&self.values, SOURCE, "set").push(key.to_string(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.remove(key);
        Ok(())
    }

    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut sets = rw_write(&self.sets, SOURCE, "add_to_set");
        let set = sets.entry(key.to_string()).or_insert_with(|| TrackedSet {
            members: HashSet::new(),
            expires_at: now,
        });
        if set.expires_at <= now {
            set.members.clear();
        }
        set.members.extend(members.iter().cloned());
        set.expires_at = now + ttl;

        if sets.len() > self.set_sweep_threshold {
            sets.retain(|_, set| set.expires_at > now);
        }
        Ok(())
    }

    async fn get_set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let sets = rw_read(&self.sets, SOURCE, "get_set_members");
        let mut members: Vec<String> = match sets.get(key) {
            Some(set) if set.expires_at > now => set.members.iter().cloned().collect(),
            _ => Vec::new(),
        };
        members.sort_unstable();
        Ok(members)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut values = rw_write(&self.values, SOURCE, "delete_keys");
        let mut sets = rw_write(&self.sets, SOURCE, "delete_keys");
        for key in keys {
            values.pop(key.as_str());
            sets.remove(key.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> MemoryCacheService {
        MemoryCacheService::with_capacity(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let cache = cache(8);
        cache
            .set("post:id:1", "{}".into(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(cache.get("post:id:1").await.unwrap().as_deref(), Some("{}"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("post:id:1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn least_recently_used_value_is_evicted() {
        let cache = cache(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", "1".into(), ttl).await.unwrap();
        cache.set("b", "2".into(), ttl).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", "3".into(), ttl).await.unwrap();

        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("c"));
    }

    #[tokio::test]
    async fn sets_accumulate_members_and_survive_value_eviction() {
        let cache = cache(1);
        let ttl = Duration::from_secs(60);
        cache
            .add_to_set("tracker", &["k1".into()], ttl)
            .await
            .unwrap();
        cache
            .add_to_set("tracker", &["k2".into(), "k1".into()], ttl)
            .await
            .unwrap();
        cache.set("x", "1".into(), ttl).await.unwrap();
        cache.set("y", "2".into(), ttl).await.unwrap();

        assert_eq!(
            cache.get_set_members("tracker").await.unwrap(),
            vec!["k1".to_string(), "k2".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn adding_members_extends_set_expiry() {
        let cache = cache(4);
        cache
            .add_to_set("tracker", &["k1".into()], Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache
            .add_to_set("tracker", &["k2".into()], Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get_set_members("tracker").await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(cache.get_set_members("tracker").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_keys_removes_values_and_sets() {
        let cache = cache(8);
        let ttl = Duration::from_secs(60);
        cache.set("page:1", "a".into(), ttl).await.unwrap();
        cache.set("page:2", "b".into(), ttl).await.unwrap();
        cache
            .add_to_set("tracker", &["page:1".into(), "page:2".into()], ttl)
            .await
            .unwrap();

        cache
            .delete_keys(&["page:1".into(), "page:2".into(), "tracker".into()])
            .await
            .unwrap();

        assert!(!cache.contains_key("page:1"));
        assert!(!cache.contains_key("page:2"));
        assert!(!cache.contains_key("tracker"));
    }
}
