use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostSearchQuery, PostsRepo, RepoError, SearchPage, UpdatePostParams,
};
use crate::application::search::sort_posts;
use crate::domain::entities::PostRecord;
use crate::domain::scoring::CounterDelta;
use crate::domain::types::InteractionAction;

use super::MemoryRepositories;

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let now = self.tick();
        let post = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            body: params.body,
            author_id: params.author_id,
            tags: params.tags,
            views: 0,
            likes: 0,
            dislikes: 0,
            comment_count: 0,
            engagement_score: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let now = self.tick();
        let mut entry = self.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        entry.title = params.title;
        entry.body = params.body;
        entry.tags = params.tags;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.posts.remove(&id).ok_or(RepoError::NotFound)?;
        let mut removed = Vec::new();
        self.comments.retain(|comment_id, comment| {
            let keep = comment.post_id != id;
            if !keep {
                removed.push(*comment_id);
            }
            keep
        });
        self.interaction_index.retain(|(_, post_id), _| *post_id != id);
        self.interactions
            .retain(|_, interaction| interaction.post_id != id);
        Ok(removed)
    }

    /// Filters and sorts in process with the shared ranking, then pages.
    async fn search_posts(
        &self,
        query: &PostSearchQuery,
    ) -> Result<SearchPage<PostRecord>, RepoError> {
        let mut matching: Vec<PostRecord> = self
            .posts
            .iter()
            .filter(|entry| query.filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        let total = matching.len() as u64;

        sort_posts(
            &mut matching,
            query.sort_by,
            query.sort_order,
            query.now,
            self.scoring.gravity,
        );

        Ok(SearchPage::new(query.page.slice(&matching), total))
    }

    async fn list_post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        let mut posts: Vec<(time::OffsetDateTime, Uuid)> = self
            .posts
            .iter()
            .map(|entry| (entry.created_at, entry.id))
            .collect();
        posts.sort();
        Ok(posts.into_iter().map(|(_, id)| id).collect())
    }

    async fn apply_counter_delta(&self, id: Uuid, delta: CounterDelta) -> Result<(), RepoError> {
        if delta.is_zero() {
            return Ok(());
        }
        let score_delta = delta.score_delta(&self.scoring);
        let mut entry = self.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.views += delta.views;
        entry.likes += delta.likes;
        entry.dislikes += delta.dislikes;
        entry.comment_count += delta.comments;
        entry.engagement_score += score_delta;
        Ok(())
    }

    async fn recount_engagement(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let (likes, dislikes) = self
            .interactions
            .iter()
            .filter(|entry| entry.post_id == id)
            .fold((0, 0), |(likes, dislikes), entry| match entry.action {
                InteractionAction::Like => (likes + 1, dislikes),
                InteractionAction::Dislike => (likes, dislikes + 1),
            });
        let comments = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == id && entry.parent_id.is_none())
            .count() as i64;

        let mut entry = self.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.likes = likes;
        entry.dislikes = dislikes;
        entry.comment_count = comments;
        entry.engagement_score = self
            .scoring
            .score_for(entry.views, likes, dislikes, comments);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::PageRequest;
    use crate::application::search::{FilterExpr, SortBy, SortOrder};
    use crate::domain::scoring::ScoringConfig;

    fn params(title: &str) -> CreatePostParams {
        CreatePostParams {
            title: title.to_string(),
            body: String::new(),
            author_id: Uuid::new_v4(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn counter_deltas_move_score_with_counters() {
        let store = MemoryRepositories::default();
        let post = store.create_post(params("a")).await.unwrap();

        store.increment_likes(post.id, 3).await.unwrap();
        store.increment_views(post.id, 10).await.unwrap();
        store.update_interaction_counts(post.id, -1, 1).await.unwrap();

        let post = store.find_post(post.id).await.unwrap().unwrap();
        let config = ScoringConfig::default();
        assert_eq!((post.likes, post.dislikes, post.views), (2, 1, 10));
        assert_eq!(
            post.engagement_score,
            3.0 * config.like_weight + 10.0 * config.view_weight - config.like_weight
                + config.dislike_weight
        );
    }

    #[tokio::test]
    async fn increments_on_missing_posts_are_not_found() {
        let store = MemoryRepositories::default();
        let err = store.increment_views(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn search_counts_before_paging() {
        let store = MemoryRepositories::default();
        for title in ["b", "a", "c"] {
            store.create_post(params(title)).await.unwrap();
        }

        let page = store
            .search_posts(&PostSearchQuery {
                filter: FilterExpr::True,
                sort_by: SortBy::Title,
                sort_order: SortOrder::Asc,
                page: PageRequest::new(2, 2).unwrap(),
                now: time::OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "c");
    }

    #[tokio::test]
    async fn recount_restores_counters_from_rows() {
        let store = MemoryRepositories::default();
        let post = store.create_post(params("a")).await.unwrap();
        store.increment_likes(post.id, 5).await.unwrap();

        let recounted = store.recount_engagement(post.id).await.unwrap();

        assert_eq!(recounted.likes, 0);
        assert_eq!(recounted.engagement_score, 0.0);
    }
}
