//! Post orchestration: CRUD with authorship checks, search and interactions.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::deadline::with_deadline;
use crate::application::error::AppError;
use crate::application::repos::{
    CreateInteractionParams, CreatePostParams, InteractionsRepo, PostsRepo, RepoError,
    UpdatePostParams,
};
use crate::application::search::{SearchRequest, SearchResults, SearchService};
use crate::domain::entities::PostRecord;
use crate::domain::types::InteractionAction;

const MAX_TITLE_CHARS: usize = 200;
const MAX_TAGS: usize = 20;

#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// What [`PostService::interact`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractOutcome {
    /// First interaction of this user with the post.
    Created,
    /// The same action was already recorded.
    Unchanged,
    /// A like became a dislike or the reverse.
    Swapped,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    interactions: Arc<dyn InteractionsRepo>,
    search: SearchService,
    request_timeout: Duration,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        interactions: Arc<dyn InteractionsRepo>,
        search: SearchService,
        request_timeout: Duration,
    ) -> Self {
        Self {
            posts,
            interactions,
            search,
            request_timeout,
        }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        draft: PostDraft,
    ) -> Result<PostRecord, AppError> {
        with_deadline("create_post", self.request_timeout, async {
            let draft = normalize_draft(draft)?;
            let post = self
                .posts
                .create_post(CreatePostParams {
                    title: draft.title,
                    body: draft.body,
                    author_id,
                    tags: draft.tags,
                })
                .await?;
            info!(post_id = %post.id, author_id = %author_id, "Post created");
            Ok::<_, AppError>(post)
        })
        .await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<PostRecord, AppError> {
        with_deadline("get_post", self.request_timeout, self.load(id)).await
    }

    /// Fetch a post and count the view. The returned record may predate
    /// recent counter changes by up to one cache TTL.
    pub async fn view_post(&self, id: Uuid) -> Result<PostRecord, AppError> {
        with_deadline("view_post", self.request_timeout, async {
            let post = self.load(id).await?;
            self.posts.increment_views(id, 1).await?;
            Ok::<_, AppError>(post)
        })
        .await
    }

    pub async fn update_post(
        &self,
        actor_id: Uuid,
        id: Uuid,
        draft: PostDraft,
    ) -> Result<PostRecord, AppError> {
        with_deadline("update_post", self.request_timeout, async {
            let existing = self.load(id).await?;
            ensure_author(&existing, actor_id)?;
            let draft = normalize_draft(draft)?;
            let updated = self
                .posts
                .update_post(UpdatePostParams {
                    id,
                    title: draft.title,
                    body: draft.body,
                    tags: draft.tags,
                })
                .await
                .map_err(|err| not_found_as("post", err))?;
            info!(post_id = %id, "Post updated");
            Ok::<_, AppError>(updated)
        })
        .await
    }

    pub async fn delete_post(&self, actor_id: Uuid, id: Uuid) -> Result<(), AppError> {
        with_deadline("delete_post", self.request_timeout, async {
            let existing = self.load(id).await?;
            ensure_author(&existing, actor_id)?;
            let removed = self
                .posts
                .delete_post(id)
                .await
                .map_err(|err| not_found_as("post", err))?;
            info!(post_id = %id, comments_removed = removed.len(), "Post deleted");
            Ok::<_, AppError>(())
        })
        .await
    }

    pub async fn search_and_filter(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResults, AppError> {
        with_deadline(
            "search_and_filter",
            self.request_timeout,
            self.search.search(request),
        )
        .await
    }

    /// Record a like or dislike, adjusting the post counters to match:
    /// a new interaction bumps one counter, repeating the current action is a
    /// no-op, and switching applies both deltas in one combined update.
    pub async fn interact(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        action: InteractionAction,
    ) -> Result<InteractOutcome, AppError> {
        with_deadline("interact", self.request_timeout, async {
            self.load(post_id).await?;

            let outcome = match self.interactions.find_interaction(user_id, post_id).await? {
                None => {
                    self.interactions
                        .create_interaction(CreateInteractionParams {
                            user_id,
                            post_id,
                            action,
                        })
                        .await
                        .map_err(|err| match err {
                            RepoError::Duplicate { .. } => AppError::conflict(
                                "a concurrent interaction for this user and post already exists",
                            ),
                            other => AppError::from(other),
                        })?;
                    match action {
                        InteractionAction::Like => self.posts.increment_likes(post_id, 1).await?,
                        InteractionAction::Dislike => {
                            self.posts.increment_dislikes(post_id, 1).await?
                        }
                    }
                    InteractOutcome::Created
                }
                Some(existing) if existing.action == action => InteractOutcome::Unchanged,
                Some(existing) => {
                    let switched = self
                        .interactions
                        .update_interaction_action(&existing, action)
                        .await?;
                    if switched.is_none() {
                        // A concurrent write already moved the row and its counters.
                        return Ok(InteractOutcome::Unchanged);
                    }
                    let (removed_likes, removed_dislikes) = existing.action.counter_deltas(-1);
                    let (added_likes, added_dislikes) = action.counter_deltas(1);
                    self.posts
                        .update_interaction_counts(
                            post_id,
                            removed_likes + added_likes,
                            removed_dislikes + added_dislikes,
                        )
                        .await?;
                    InteractOutcome::Swapped
                }
            };

            debug!(
                post_id = %post_id,
                user_id = %user_id,
                action = %action,
                outcome = ?outcome,
                "Interaction recorded"
            );
            Ok::<_, AppError>(outcome)
        })
        .await
    }

    /// Withdraw a user's interaction. Returns `false` when there was none.
    pub async fn remove_interaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        with_deadline("remove_interaction", self.request_timeout, async {
            let Some(existing) = self.interactions.find_interaction(user_id, post_id).await?
            else {
                return Ok(false);
            };
            let removed = match self.interactions.delete_interaction(existing.id).await {
                Ok(removed) => removed,
                Err(RepoError::NotFound) => return Ok(false),
                Err(err) => return Err(AppError::from(err)),
            };
            let (likes, dislikes) = removed.action.counter_deltas(-1);
            self.posts
                .update_interaction_counts(post_id, likes, dislikes)
                .await?;
            Ok::<_, AppError>(true)
        })
        .await
    }

    async fn load(&self, id: Uuid) -> Result<PostRecord, AppError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or(AppError::not_found("post"))
    }
}

fn ensure_author(post: &PostRecord, actor_id: Uuid) -> Result<(), AppError> {
    if post.author_id == actor_id {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "only the author may modify this post",
        ))
    }
}

fn not_found_as(entity: &'static str, err: RepoError) -> AppError {
    match err {
        RepoError::NotFound => AppError::not_found(entity),
        other => AppError::from(other),
    }
}

fn normalize_draft(draft: PostDraft) -> Result<PostDraft, AppError> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in draft.tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(AppError::validation(format!(
            "a post may carry at most {MAX_TAGS} tags"
        )));
    }

    Ok(PostDraft {
        title,
        body: draft.body,
        tags,
    })
}
