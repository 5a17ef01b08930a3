use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CreateInteractionParams, InteractionsRepo, RepoError};
use crate::domain::entities::InteractionRecord;
use crate::domain::types::InteractionAction;

use super::keys::{EntityKind, interaction_key};
use super::layer::CacheLayer;
use super::service::CacheService;

/// Interactions store caching the (user, post) lookup used on every
/// like/dislike toggle.
pub struct CachedInteractionsRepo {
    inner: Arc<dyn InteractionsRepo>,
    layer: CacheLayer,
    ttl: Duration,
}

impl CachedInteractionsRepo {
    pub fn new(
        inner: Arc<dyn InteractionsRepo>,
        cache: Arc<dyn CacheService>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            layer: CacheLayer::new(cache, EntityKind::Interaction),
            ttl,
        }
    }
}

#[async_trait]
impl InteractionsRepo for CachedInteractionsRepo {
    async fn create_interaction(
        &self,
        params: CreateInteractionParams,
    ) -> Result<InteractionRecord, RepoError> {
        let created = self.inner.create_interaction(params).await?;
        self.layer
            .invalidate(&interaction_key(created.user_id, created.post_id))
            .await;
        Ok(created)
    }

    async fn find_interaction(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        self.layer
            .read_through(&interaction_key(user_id, post_id), self.ttl, || {
                self.inner.find_interaction(user_id, post_id)
            })
            .await
    }

    /// The cached pair is dropped even when the switch is refused, since a
    /// refusal means `existing` was stale.
    async fn update_interaction_action(
        &self,
        existing: &InteractionRecord,
        action: InteractionAction,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        let updated = self.inner.update_interaction_action(existing, action).await?;
        self.layer
            .invalidate(&interaction_key(existing.user_id, existing.post_id))
            .await;
        Ok(updated)
    }

    async fn delete_interaction(&self, id: Uuid) -> Result<InteractionRecord, RepoError> {
        let deleted = self.inner.delete_interaction(id).await?;
        self.layer
            .invalidate(&interaction_key(deleted.user_id, deleted.post_id))
            .await;
        Ok(deleted)
    }
}
