use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, DeletedThread, PageRequest, RepoError, SearchPage,
    UpdateCommentParams,
};
use crate::domain::entities::CommentRecord;

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str =
    "id, post_id, parent_id, author_id, body, reply_count, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    parent_id: Option<Uuid>,
    author_id: Option<Uuid>,
    body: String,
    reply_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            author_id: row.author_id,
            body: row.body,
            reply_count: row.reply_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Which column scopes a comment listing.
#[derive(Clone, Copy)]
enum Listing {
    TopLevel(Uuid),
    Replies(Uuid),
}

impl Listing {
    fn predicate(self) -> &'static str {
        match self {
            Listing::TopLevel(_) => "post_id = $1 AND parent_id IS NULL",
            Listing::Replies(_) => "parent_id = $1",
        }
    }

    fn scope_id(self) -> Uuid {
        match self {
            Listing::TopLevel(id) | Listing::Replies(id) => id,
        }
    }
}

impl PostgresRepositories {
    async fn list_comments(
        &self,
        listing: Listing,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        let predicate = listing.predicate();

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments WHERE {predicate}"))
                .bind(listing.scope_id())
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE {predicate}
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(listing.scope_id())
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SearchPage::new(
            rows.into_iter().map(CommentRecord::from).collect(),
            Self::convert_count(total)?,
        ))
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            INSERT INTO comments (id, post_id, parent_id, author_id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.post_id)
        .bind(params.parent_id)
        .bind(params.author_id)
        .bind(params.body)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord::from(row))
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            UPDATE comments SET body = $2, updated_at = $3
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.body)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(CommentRecord::from(row))
    }

    /// The thread is collected and removed in one statement so every
    /// cascaded reply is reported back.
    async fn delete_comment(&self, id: Uuid) -> Result<DeletedThread, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            WITH RECURSIVE thread AS (
                SELECT id FROM comments WHERE id = $1
                UNION ALL
                SELECT c.id FROM comments c JOIN thread t ON c.parent_id = t.id
            )
            DELETE FROM comments
            WHERE id IN (SELECT id FROM thread)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut comment = None;
        let mut descendants = Vec::with_capacity(rows.len().saturating_sub(1));
        for row in rows {
            if row.id == id {
                comment = Some(CommentRecord::from(row));
            } else {
                descendants.push(row.id);
            }
        }

        Ok(DeletedThread {
            comment: comment.ok_or(RepoError::NotFound)?,
            descendants,
        })
    }

    async fn list_comments_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.list_comments(Listing::TopLevel(post_id), page).await
    }

    async fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.list_comments(Listing::Replies(parent_id), page).await
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE comments SET reply_count = reply_count + $2 WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn anonymize_author(&self, author_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            UPDATE comments SET author_id = NULL, updated_at = $2
            WHERE author_id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(author_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }
}
