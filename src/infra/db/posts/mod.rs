mod read;
mod types;
mod write;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostSearchQuery, PostsRepo, RepoError, SearchPage, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::scoring::CounterDelta;

use super::PostgresRepositories;

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.insert_post(params).await
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.select_post(id).await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        self.rewrite_post(params).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.remove_post(id).await
    }

    async fn search_posts(
        &self,
        query: &PostSearchQuery,
    ) -> Result<SearchPage<PostRecord>, RepoError> {
        let total = self.count_matching(query).await?;
        if total == 0 {
            return Ok(SearchPage::new(Vec::new(), 0));
        }
        let items = self.select_matching(query).await?;
        Ok(SearchPage::new(items, total))
    }

    async fn list_post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        self.select_post_ids().await
    }

    async fn apply_counter_delta(&self, id: Uuid, delta: CounterDelta) -> Result<(), RepoError> {
        if delta.is_zero() {
            return Ok(());
        }
        self.bump_counters(id, delta).await
    }

    async fn recount_engagement(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        self.recount(id).await
    }
}
