use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateInteractionParams, InteractionsRepo, RepoError};
use crate::domain::entities::InteractionRecord;
use crate::domain::types::InteractionAction;

use super::{PostgresRepositories, map_sqlx_error};

const INTERACTION_COLUMNS: &str = "id, user_id, post_id, action, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: Uuid,
    user_id: Uuid,
    post_id: Uuid,
    action: InteractionAction,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<InteractionRow> for InteractionRecord {
    fn from(row: InteractionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            post_id: row.post_id,
            action: row.action,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl InteractionsRepo for PostgresRepositories {
    /// The `(user_id, post_id)` unique constraint surfaces as
    /// [`RepoError::Duplicate`].
    async fn create_interaction(
        &self,
        params: CreateInteractionParams,
    ) -> Result<InteractionRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            r#"
            INSERT INTO interactions (id, user_id, post_id, action, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {INTERACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.post_id)
        .bind(params.action)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(InteractionRecord::from(row))
    }

    async fn find_interaction(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions WHERE user_id = $1 AND post_id = $2"
        ))
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(InteractionRecord::from))
    }

    async fn update_interaction_action(
        &self,
        existing: &InteractionRecord,
        action: InteractionAction,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            r#"
            UPDATE interactions SET action = $3, updated_at = $4
            WHERE id = $1 AND action = $2
            RETURNING {INTERACTION_COLUMNS}
            "#
        ))
        .bind(existing.id)
        .bind(existing.action)
        .bind(action)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(InteractionRecord::from))
    }

    async fn delete_interaction(&self, id: Uuid) -> Result<InteractionRecord, RepoError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            "DELETE FROM interactions WHERE id = $1 RETURNING {INTERACTION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(InteractionRecord::from(row))
    }
}
