use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use crate::application::repos::{CreateTokenParams, RepoError, TokensRepo};
use crate::domain::entities::TokenRecord;

use super::keys::EntityKind;
use super::layer::CacheLayer;
use super::service::CacheService;

pub struct CachedTokensRepo {
    inner: Arc<dyn TokensRepo>,
    layer: CacheLayer,
    ttl: Duration,
}

impl CachedTokensRepo {
    pub fn new(inner: Arc<dyn TokensRepo>, cache: Arc<dyn CacheService>, ttl: Duration) -> Self {
        Self {
            inner,
            layer: CacheLayer::new(cache, EntityKind::Token),
            ttl,
        }
    }

    fn key(id: Uuid) -> String {
        EntityKind::Token.id_key(id)
    }
}

#[async_trait]
impl TokensRepo for CachedTokensRepo {
    async fn create_token(&self, params: CreateTokenParams) -> Result<TokenRecord, RepoError> {
        self.inner.create_token(params).await
    }

    async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>, RepoError> {
        self.layer
            .read_through(&Self::key(id), self.ttl, || self.inner.find_token(id))
            .await
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_token(id).await?;
        self.layer.invalidate(&Self::key(id)).await;
        Ok(())
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let removed = self.inner.delete_tokens_for_user(user_id).await?;
        join_all(
            removed
                .iter()
                .map(|id| Self::key(*id))
                .map(|key| async move { self.layer.invalidate(&key).await }),
        )
        .await;
        Ok(removed)
    }
}
