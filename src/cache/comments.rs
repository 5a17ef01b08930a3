use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, DeletedThread, PageRequest, RepoError, SearchPage,
    UpdateCommentParams,
};
use crate::domain::entities::CommentRecord;

use super::keys::{CommentGrouping, EntityKind};
use super::layer::CacheLayer;
use super::service::CacheService;

/// Drop the point entry and the replies grouping of every removed comment.
pub(super) async fn invalidate_removed_comments<I>(layer: &CacheLayer, removed: I)
where
    I: IntoIterator<Item = Uuid>,
{
    join_all(removed.into_iter().map(|id| async move {
        layer.invalidate(&EntityKind::Comment.id_key(id)).await;
        layer
            .invalidate_tracked(&CommentGrouping::Replies(id).tracker_key())
            .await;
    }))
    .await;
}

/// Comments store with cached point lookups and tracker-invalidated page
/// caches.
///
/// Every write that changes what a grouping lists invalidates that grouping
/// before returning, so a read issued after the write returns never sees a
/// page missing the new state.
pub struct CachedCommentsRepo {
    inner: Arc<dyn CommentsRepo>,
    layer: CacheLayer,
    item_ttl: Duration,
    list_ttl: Duration,
}

impl CachedCommentsRepo {
    pub fn new(
        inner: Arc<dyn CommentsRepo>,
        cache: Arc<dyn CacheService>,
        item_ttl: Duration,
        list_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            layer: CacheLayer::new(cache, EntityKind::Comment),
            item_ttl,
            list_ttl,
        }
    }

    fn key(id: Uuid) -> String {
        EntityKind::Comment.id_key(id)
    }

    async fn invalidate_grouping(&self, grouping: CommentGrouping) {
        self.layer
            .invalidate_tracked(&grouping.tracker_key())
            .await;
    }

    async fn cached_page<F, Fut>(
        &self,
        grouping: CommentGrouping,
        page: PageRequest,
        load: F,
    ) -> Result<SearchPage<CommentRecord>, RepoError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<SearchPage<CommentRecord>, RepoError>>,
    {
        self.layer
            .read_through_tracked(
                &grouping.tracker_key(),
                &grouping.page_key(page),
                self.list_ttl,
                load,
            )
            .await
    }
}

#[async_trait]
impl CommentsRepo for CachedCommentsRepo {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let created = self.inner.create_comment(params).await?;
        self.invalidate_grouping(CommentGrouping::of(&created)).await;
        Ok(created)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        self.layer
            .read_through(&Self::key(id), self.item_ttl, || self.inner.find_comment(id))
            .await
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let updated = self.inner.update_comment(params).await?;
        self.layer.invalidate(&Self::key(updated.id)).await;
        self.invalidate_grouping(CommentGrouping::of(&updated)).await;
        Ok(updated)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<DeletedThread, RepoError> {
        let deleted = self.inner.delete_comment(id).await?;
        self.invalidate_grouping(CommentGrouping::of(&deleted.comment))
            .await;
        invalidate_removed_comments(&self.layer, deleted.removed_ids()).await;
        Ok(deleted)
    }

    async fn list_comments_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.cached_page(CommentGrouping::Post(post_id), page, || {
            self.inner.list_comments_by_post(post_id, page)
        })
        .await
    }

    async fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.cached_page(CommentGrouping::Replies(parent_id), page, || {
            self.inner.list_replies(parent_id, page)
        })
        .await
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.inner.increment_reply_count(id, delta).await
    }

    async fn anonymize_author(&self, author_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let changed = self.inner.anonymize_author(author_id).await?;

        let groupings: HashSet<CommentGrouping> = changed.iter().map(CommentGrouping::of).collect();
        join_all(
            changed
                .iter()
                .map(|comment| Self::key(comment.id))
                .map(|key| async move { self.layer.invalidate(&key).await }),
        )
        .await;
        join_all(
            groupings
                .into_iter()
                .map(|grouping| self.invalidate_grouping(grouping)),
        )
        .await;

        Ok(changed)
    }
}
