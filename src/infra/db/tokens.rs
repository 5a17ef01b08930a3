use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateTokenParams, RepoError, TokensRepo};
use crate::domain::entities::TokenRecord;

use super::{PostgresRepositories, map_sqlx_error};

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, created_at";

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TokensRepo for PostgresRepositories {
    async fn create_token(&self, params: CreateTokenParams) -> Result<TokenRecord, RepoError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            r#"
            INSERT INTO tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.token_hash)
        .bind(params.expires_at)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TokenRecord::from(row))
    }

    async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TokenRecord::from))
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>("DELETE FROM tokens WHERE user_id = $1 RETURNING id")
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
