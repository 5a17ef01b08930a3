//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::search::{FilterExpr, SortBy, SortOrder};
use crate::domain::entities::{
    CommentRecord, InteractionRecord, PostRecord, TokenRecord, UserRecord,
};
use crate::domain::error::DomainError;
use crate::domain::scoring::CounterDelta;
use crate::domain::types::InteractionAction;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// One-based page number plus page size. Both are at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, DomainError> {
        if page < 1 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit < 1 {
            return Err(DomainError::validation("limit must be at least 1"));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows skipped before this page, i.e. `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Slice an already sorted slice down to this page.
    pub fn slice<T: Clone>(&self, sorted: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        sorted
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// A page of results plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> SearchPage<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

/// Fully validated post query handed to the store.
#[derive(Debug, Clone)]
pub struct PostSearchQuery {
    pub filter: FilterExpr,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: PageRequest,
    /// Reference instant for popularity decay; shared by store and caller.
    pub now: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Delete a post together with its comments and interactions. Returns
    /// the ids of every comment removed with it.
    async fn delete_post(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError>;

    async fn search_posts(
        &self,
        query: &PostSearchQuery,
    ) -> Result<SearchPage<PostRecord>, RepoError>;

    async fn list_post_ids(&self) -> Result<Vec<Uuid>, RepoError>;

    /// Apply every counter in `delta` and the matching `engagement_score`
    /// change in a single atomic update.
    async fn apply_counter_delta(&self, id: Uuid, delta: CounterDelta) -> Result<(), RepoError>;

    /// Recompute likes, dislikes and comment count from their source rows and
    /// rewrite `engagement_score` from the result.
    async fn recount_engagement(&self, id: Uuid) -> Result<PostRecord, RepoError>;

    async fn increment_views(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.apply_counter_delta(id, CounterDelta::views(delta))
            .await
    }

    async fn increment_likes(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.apply_counter_delta(id, CounterDelta::likes(delta))
            .await
    }

    async fn increment_dislikes(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.apply_counter_delta(id, CounterDelta::dislikes(delta))
            .await
    }

    async fn increment_comment_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.apply_counter_delta(id, CounterDelta::comments(delta))
            .await
    }

    /// Like/dislike swap applied as one update.
    async fn update_interaction_counts(
        &self,
        id: Uuid,
        likes_delta: i64,
        dislikes_delta: i64,
    ) -> Result<(), RepoError> {
        self.apply_counter_delta(id, CounterDelta::interactions(likes_delta, dislikes_delta))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentParams {
    pub id: Uuid,
    pub body: String,
}

/// A deleted comment and the ids of the replies removed beneath it, at any
/// depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedThread {
    pub comment: CommentRecord,
    pub descendants: Vec<Uuid>,
}

impl DeletedThread {
    /// Ids of every removed comment, the deleted comment first.
    pub fn removed_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.comment.id).chain(self.descendants.iter().copied())
    }
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn update_comment(&self, params: UpdateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Delete a comment and, transitively, its replies.
    async fn delete_comment(&self, id: Uuid) -> Result<DeletedThread, RepoError>;

    /// Top-level comments of a post, oldest first.
    async fn list_comments_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError>;

    /// Direct replies of a comment, oldest first.
    async fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError>;

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError>;

    /// Clear the author of every comment written by `author_id`. Returns the
    /// comments as they are after anonymization.
    async fn anonymize_author(&self, author_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateInteractionParams {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub action: InteractionAction,
}

#[async_trait]
pub trait InteractionsRepo: Send + Sync {
    /// Fails with [`RepoError::Duplicate`] when the user already interacted
    /// with the post.
    async fn create_interaction(
        &self,
        params: CreateInteractionParams,
    ) -> Result<InteractionRecord, RepoError>;

    async fn find_interaction(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<InteractionRecord>, RepoError>;

    /// Switch `existing` to `action`, but only while the stored row still
    /// holds `existing.action`. Returns `None` when the row has changed or
    /// gone since it was read.
    async fn update_interaction_action(
        &self,
        existing: &InteractionRecord,
        action: InteractionAction,
    ) -> Result<Option<InteractionRecord>, RepoError>;

    async fn delete_interaction(&self, id: Uuid) -> Result<InteractionRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;
}

/// Maps a display name to the author ids it denotes.
#[async_trait]
pub trait AuthorResolver: Send + Sync {
    /// Case-insensitive match on username or display name.
    async fn resolve_author_ids(&self, name: &str) -> Result<Vec<Uuid>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateTokenParams {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait TokensRepo: Send + Sync {
    async fn create_token(&self, params: CreateTokenParams) -> Result<TokenRecord, RepoError>;

    async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>, RepoError>;

    async fn delete_token(&self, id: Uuid) -> Result<(), RepoError>;

    /// Returns the ids of the removed tokens.
    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}
