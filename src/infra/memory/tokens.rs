use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{CreateTokenParams, RepoError, TokensRepo};
use crate::domain::entities::TokenRecord;

use super::MemoryRepositories;

#[async_trait]
impl TokensRepo for MemoryRepositories {
    async fn create_token(&self, params: CreateTokenParams) -> Result<TokenRecord, RepoError> {
        if !self.users.contains_key(&params.user_id) {
            return Err(RepoError::invalid_input("token references an unknown user"));
        }
        let token = TokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            token_hash: params.token_hash,
            expires_at: params.expires_at,
            created_at: self.tick(),
        };
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>, RepoError> {
        Ok(self.tokens.get(&id).map(|entry| entry.value().clone()))
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), RepoError> {
        self.tokens
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let ids: Vec<Uuid> = self
            .tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.id)
            .collect();
        for id in &ids {
            self.tokens.remove(id);
        }
        Ok(ids)
    }
}
