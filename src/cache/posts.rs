use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostSearchQuery, PostsRepo, RepoError, SearchPage, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::scoring::CounterDelta;

use super::comments::invalidate_removed_comments;
use super::keys::{CommentGrouping, EntityKind};
use super::layer::CacheLayer;
use super::service::CacheService;

/// Posts store with read-through point lookups.
///
/// Counter increments deliberately leave the cached record alone; it expires
/// through its TTL. Searches are never cached.
pub struct CachedPostsRepo {
    inner: Arc<dyn PostsRepo>,
    layer: CacheLayer,
    /// Comment entries removed with a post.
    comments: CacheLayer,
    ttl: Duration,
}

impl CachedPostsRepo {
    pub fn new(inner: Arc<dyn PostsRepo>, cache: Arc<dyn CacheService>, ttl: Duration) -> Self {
        Self {
            inner,
            layer: CacheLayer::new(cache.clone(), EntityKind::Post),
            comments: CacheLayer::new(cache, EntityKind::Comment),
            ttl,
        }
    }

    fn key(id: Uuid) -> String {
        EntityKind::Post.id_key(id)
    }
}

#[async_trait]
impl PostsRepo for CachedPostsRepo {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.inner.create_post(params).await
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.layer
            .read_through(&Self::key(id), self.ttl, || self.inner.find_post(id))
            .await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let updated = self.inner.update_post(params).await?;
        self.layer.invalidate(&Self::key(updated.id)).await;
        Ok(updated)
    }

    async fn delete_post(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let removed = self.inner.delete_post(id).await?;
        self.layer.invalidate(&Self::key(id)).await;
        self.comments
            .invalidate_tracked(&CommentGrouping::Post(id).tracker_key())
            .await;
        invalidate_removed_comments(&self.comments, removed.iter().copied()).await;
        Ok(removed)
    }

    async fn search_posts(
        &self,
        query: &PostSearchQuery,
    ) -> Result<SearchPage<PostRecord>, RepoError> {
        self.inner.search_posts(query).await
    }

    async fn list_post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        self.inner.list_post_ids().await
    }

    async fn apply_counter_delta(&self, id: Uuid, delta: CounterDelta) -> Result<(), RepoError> {
        self.inner.apply_counter_delta(id, delta).await
    }

    async fn recount_engagement(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let recounted = self.inner.recount_engagement(id).await?;
        self.layer.invalidate(&Self::key(id)).await;
        Ok(recounted)
    }
}
