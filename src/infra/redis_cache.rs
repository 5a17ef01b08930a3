//! Redis-backed [`CacheService`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::info;

use crate::cache::{CacheConfig, CacheError, CacheService};

#[derive(Clone)]
pub struct RedisCacheService {
    connection: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCacheService {
    /// Open a managed connection. Fails if the server cannot be reached
    /// within the configured operation timeout.
    pub async fn connect(url: &str, config: &CacheConfig) -> Result<Self, CacheError> {
        let op_timeout = config.op_timeout();
        let client = Client::open(url).map_err(CacheError::backend)?;
        let connection = tokio::time::timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| CacheError::Timeout {
                op: "connect",
                limit: op_timeout,
            })?
            .map_err(CacheError::backend)?;
        info!(target = "chorus::cache", "Connected to redis cache");
        Ok(Self {
            connection,
            op_timeout,
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, future: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, future).await {
            Ok(result) => result.map_err(CacheError::backend),
            Err(_) => Err(CacheError::Timeout {
                op,
                limit: self.op_timeout,
            }),
        }
    }
}

fn whole_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheService for RedisCacheService {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        self.bounded("get", async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.bounded("set", async move {
            conn.set_ex::<_, _, ()>(key, value, whole_seconds(ttl)).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        self.bounded("delete", async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn add_to_set(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .sadd(key, members.to_vec())
            .ignore()
            .expire(key, whole_seconds(ttl) as i64)
            .ignore();
        self.bounded("add_to_set", async move {
            let _: () = pipe.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn get_set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.clone();
        self.bounded("get_set_members", async move {
            conn.smembers::<_, Vec<String>>(key).await
        })
        .await
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let keys = keys.to_vec();
        self.bounded("delete_keys", async move { conn.del::<_, ()>(keys).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttls_round_down_to_at_least_one_second() {
        assert_eq!(whole_seconds(Duration::from_millis(10)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(2_500)), 2);
    }

    #[tokio::test]
    async fn malformed_urls_are_rejected() {
        let result = RedisCacheService::connect("not a url", &CacheConfig::default()).await;
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }
}
