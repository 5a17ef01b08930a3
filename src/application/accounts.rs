use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::application::deadline::with_deadline;
use crate::application::error::AppError;
use crate::application::repos::{
    CommentsRepo, CreateUserParams, RepoError, TokensRepo, UpdateUserParams, UsersRepo,
};
use crate::domain::entities::UserRecord;

/// User profile operations and account removal.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<dyn TokensRepo>,
    comments: Arc<dyn CommentsRepo>,
    request_timeout: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        tokens: Arc<dyn TokensRepo>,
        comments: Arc<dyn CommentsRepo>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            comments,
            request_timeout,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        display_name: &str,
        email: &str,
    ) -> Result<UserRecord, AppError> {
        with_deadline("register", self.request_timeout, async {
            let username = username.trim();
            if username.is_empty() {
                return Err(AppError::validation("username must not be empty"));
            }
            let email = email.trim();
            if !email.contains('@') {
                return Err(AppError::validation("email address is malformed"));
            }
            let display_name = match display_name.trim() {
                "" => username,
                name => name,
            };
            let user = self
                .users
                .create_user(CreateUserParams {
                    username: username.to_string(),
                    display_name: display_name.to_string(),
                    email: email.to_string(),
                })
                .await
                .map_err(|err| match err {
                    RepoError::Duplicate { .. } => {
                        AppError::conflict("username or email is already registered")
                    }
                    other => AppError::from(other),
                })?;
            info!(user_id = %user.id, "User registered");
            Ok::<_, AppError>(user)
        })
        .await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserRecord, AppError> {
        with_deadline("get_user", self.request_timeout, async {
            self.users
                .find_user(id)
                .await?
                .ok_or(AppError::not_found("user"))
        })
        .await
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        display_name: &str,
        email: &str,
    ) -> Result<UserRecord, AppError> {
        with_deadline("update_profile", self.request_timeout, async {
            let email = email.trim();
            if !email.contains('@') {
                return Err(AppError::validation("email address is malformed"));
            }
            let updated = self
                .users
                .update_user(UpdateUserParams {
                    id,
                    display_name: display_name.trim().to_string(),
                    email: email.to_string(),
                })
                .await
                .map_err(|err| match err {
                    RepoError::NotFound => AppError::not_found("user"),
                    other => AppError::from(other),
                })?;
            Ok::<_, AppError>(updated)
        })
        .await
    }

    /// Remove an account: revoke its tokens, keep its comments under an
    /// anonymous author, then delete the user record.
    pub async fn delete_account(&self, id: Uuid) -> Result<(), AppError> {
        with_deadline("delete_account", self.request_timeout, async {
            if self.users.find_user(id).await?.is_none() {
                return Err(AppError::not_found("user"));
            }
            let revoked = self.tokens.delete_tokens_for_user(id).await?;
            let anonymized = self.comments.anonymize_author(id).await?;
            self.users.delete_user(id).await?;
            info!(
                user_id = %id,
                revoked_tokens = revoked.len(),
                anonymized_comments = anonymized.len(),
                "Account deleted"
            );
            Ok::<_, AppError>(())
        })
        .await
    }
}
