use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::domain::scoring::CounterDelta;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow};

impl PostgresRepositories {
    pub(super) async fn insert_post(
        &self,
        params: CreatePostParams,
    ) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            title,
            body,
            author_id,
            tags,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO posts (id, title, body, author_id, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(body)
        .bind(author_id)
        .bind(tags)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    pub(super) async fn rewrite_post(
        &self,
        params: UpdatePostParams,
    ) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            title,
            body,
            tags,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts
            SET title = $2, body = $3, tags = $4, updated_at = $5
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(body)
        .bind(tags)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(PostRecord::from(row))
    }

    /// Comments are removed explicitly so their ids can be reported;
    /// interactions go with the post through `ON DELETE CASCADE`.
    pub(super) async fn remove_post(&self, id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let removed: Vec<Uuid> =
            sqlx::query_scalar("DELETE FROM comments WHERE post_id = $1 RETURNING id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed)
    }

    /// Counters and score move together in a single row update.
    pub(super) async fn bump_counters(
        &self,
        id: Uuid,
        delta: CounterDelta,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET views = views + $2,
                likes = likes + $3,
                dislikes = dislikes + $4,
                comment_count = comment_count + $5,
                engagement_score = engagement_score + $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta.views)
        .bind(delta.likes)
        .bind(delta.dislikes)
        .bind(delta.comments)
        .bind(delta.score_delta(self.scoring()))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    /// Recompute likes, dislikes and the top-level comment count from their
    /// source rows and rewrite the score from the resulting counters.
    pub(super) async fn recount(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let scoring = self.scoring();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts
            SET likes = truth.n_likes,
                dislikes = truth.n_dislikes,
                comment_count = truth.n_comments,
                engagement_score = views * $2
                    + truth.n_likes * $3
                    + truth.n_dislikes * $4
                    + truth.n_comments * $5
            FROM (
                SELECT
                    (SELECT COUNT(*) FROM interactions
                        WHERE post_id = $1 AND action = 'like') AS n_likes,
                    (SELECT COUNT(*) FROM interactions
                        WHERE post_id = $1 AND action = 'dislike') AS n_dislikes,
                    (SELECT COUNT(*) FROM comments
                        WHERE post_id = $1 AND parent_id IS NULL) AS n_comments
            ) AS truth
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(scoring.view_weight)
        .bind(scoring.like_weight)
        .bind(scoring.dislike_weight)
        .bind(scoring.comment_weight)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(PostRecord::from(row))
    }
}
