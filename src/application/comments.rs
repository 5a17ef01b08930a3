//! Comment orchestration.
//!
//! Creating or deleting a comment adjusts exactly one counter: the parent
//! comment's reply count for replies, the post's comment count otherwise.
//! Those adjustments run as background tasks and may lag the write itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::application::deadline::with_deadline;
use crate::application::error::AppError;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, PostsRepo, RepoError, SearchPage, UpdateCommentParams,
};
use crate::application::search::PageLimits;
use crate::application::tasks::BackgroundTasks;
use crate::domain::entities::CommentRecord;

const MAX_BODY_CHARS: usize = 10_000;

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    posts: Arc<dyn PostsRepo>,
    tasks: Arc<BackgroundTasks>,
    limits: PageLimits,
    request_timeout: Duration,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        posts: Arc<dyn PostsRepo>,
        tasks: Arc<BackgroundTasks>,
        limits: PageLimits,
        request_timeout: Duration,
    ) -> Self {
        Self {
            comments,
            posts,
            tasks,
            limits,
            request_timeout,
        }
    }

    pub async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        body: &str,
    ) -> Result<CommentRecord, AppError> {
        with_deadline("create_comment", self.request_timeout, async {
            let body = normalize_body(body)?;
            if self.posts.find_post(post_id).await?.is_none() {
                return Err(AppError::not_found("post"));
            }
            if let Some(parent_id) = parent_id {
                let parent = self
                    .comments
                    .find_comment(parent_id)
                    .await?
                    .ok_or(AppError::not_found("parent comment"))?;
                if parent.post_id != post_id {
                    return Err(AppError::validation(
                        "parent comment belongs to a different post",
                    ));
                }
            }

            let created = self
                .comments
                .create_comment(CreateCommentParams {
                    post_id,
                    parent_id,
                    author_id,
                    body,
                })
                .await?;
            self.adjust_counters(&created, 1);
            info!(
                comment_id = %created.id,
                post_id = %post_id,
                reply = parent_id.is_some(),
                "Comment created"
            );
            Ok::<_, AppError>(created)
        })
        .await
    }

    pub async fn get_comment(&self, id: Uuid) -> Result<CommentRecord, AppError> {
        with_deadline("get_comment", self.request_timeout, self.load(id)).await
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<SearchPage<CommentRecord>, AppError> {
        with_deadline("list_comments", self.request_timeout, async {
            let page = self.limits.page_request(page, limit)?;
            Ok::<_, AppError>(self.comments.list_comments_by_post(post_id, page).await?)
        })
        .await
    }

    pub async fn list_replies(
        &self,
        parent_id: Uuid,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<SearchPage<CommentRecord>, AppError> {
        with_deadline("list_replies", self.request_timeout, async {
            let page = self.limits.page_request(page, limit)?;
            Ok::<_, AppError>(self.comments.list_replies(parent_id, page).await?)
        })
        .await
    }

    pub async fn update_comment(
        &self,
        actor_id: Uuid,
        id: Uuid,
        body: &str,
    ) -> Result<CommentRecord, AppError> {
        with_deadline("update_comment", self.request_timeout, async {
            let existing = self.load(id).await?;
            ensure_author(&existing, actor_id)?;
            let body = normalize_body(body)?;
            let updated = self
                .comments
                .update_comment(UpdateCommentParams { id, body })
                .await?;
            Ok::<_, AppError>(updated)
        })
        .await
    }

    /// Delete a comment and its replies. Only the deleted comment's own
    /// counter contribution is reversed; replies removed with it were counted
    /// against it, not against the post.
    pub async fn delete_comment(&self, actor_id: Uuid, id: Uuid) -> Result<(), AppError> {
        with_deadline("delete_comment", self.request_timeout, async {
            let existing = self.load(id).await?;
            ensure_author(&existing, actor_id)?;
            let deleted = self.comments.delete_comment(id).await?;
            self.adjust_counters(&deleted.comment, -1);
            info!(
                comment_id = %id,
                post_id = %deleted.comment.post_id,
                replies_removed = deleted.descendants.len(),
                "Comment deleted"
            );
            Ok::<_, AppError>(())
        })
        .await
    }

    /// Detach every comment written by `author_id` from its author. Returns
    /// how many comments changed.
    pub async fn anonymize_author(&self, author_id: Uuid) -> Result<usize, AppError> {
        with_deadline("anonymize_author", self.request_timeout, async {
            let changed = self.comments.anonymize_author(author_id).await?;
            Ok::<_, AppError>(changed.len())
        })
        .await
    }

    fn adjust_counters(&self, comment: &CommentRecord, delta: i64) {
        match comment.parent_id {
            Some(parent_id) => {
                let comments = self.comments.clone();
                self.tasks.submit("reply_count", async move {
                    match comments.increment_reply_count(parent_id, delta).await {
                        // The parent may have been deleted in the meantime.
                        Err(RepoError::NotFound) => Ok(()),
                        other => other,
                    }
                });
            }
            None => {
                let posts = self.posts.clone();
                let post_id = comment.post_id;
                self.tasks.submit("comment_count", async move {
                    match posts.increment_comment_count(post_id, delta).await {
                        Err(RepoError::NotFound) => Ok(()),
                        other => other,
                    }
                });
            }
        }
    }

    async fn load(&self, id: Uuid) -> Result<CommentRecord, AppError> {
        self.comments
            .find_comment(id)
            .await?
            .ok_or(AppError::not_found("comment"))
    }
}

fn ensure_author(comment: &CommentRecord, actor_id: Uuid) -> Result<(), AppError> {
    if comment.author_id == Some(actor_id) {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "only the author may modify this comment",
        ))
    }
}

fn normalize_body(body: &str) -> Result<String, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::validation("comment body must not be empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::validation(format!(
            "comment body must be at most {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_are_trimmed() {
        assert_eq!(normalize_body("  hi \n").unwrap(), "hi");
    }

    #[test]
    fn empty_bodies_are_rejected() {
        assert!(matches!(
            normalize_body(" \t ").unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn anonymized_comments_have_no_author() {
        let now = time::OffsetDateTime::now_utc();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            parent_id: None,
            author_id: None,
            body: "gone".into(),
            reply_count: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            ensure_author(&comment, Uuid::new_v4()),
            Err(AppError::PermissionDenied(_))
        ));
    }
}
