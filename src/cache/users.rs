use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo};
use crate::domain::entities::UserRecord;

use super::keys::EntityKind;
use super::layer::CacheLayer;
use super::service::CacheService;

pub struct CachedUsersRepo {
    inner: Arc<dyn UsersRepo>,
    layer: CacheLayer,
    ttl: Duration,
}

impl CachedUsersRepo {
    pub fn new(inner: Arc<dyn UsersRepo>, cache: Arc<dyn CacheService>, ttl: Duration) -> Self {
        Self {
            inner,
            layer: CacheLayer::new(cache, EntityKind::User),
            ttl,
        }
    }

    fn key(id: Uuid) -> String {
        EntityKind::User.id_key(id)
    }
}

#[async_trait]
impl UsersRepo for CachedUsersRepo {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        self.inner.create_user(params).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        self.layer
            .read_through(&Self::key(id), self.ttl, || self.inner.find_user(id))
            .await
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let updated = self.inner.update_user(params).await?;
        self.layer.invalidate(&Self::key(updated.id)).await;
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_user(id).await?;
        self.layer.invalidate(&Self::key(id)).await;
        Ok(())
    }
}
