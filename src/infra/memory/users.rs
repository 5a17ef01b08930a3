use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::application::repos::{
    AuthorResolver, CreateUserParams, RepoError, UpdateUserParams, UsersRepo,
};
use crate::domain::entities::UserRecord;

use super::MemoryRepositories;

impl MemoryRepositories {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|entry| entry.email.eq_ignore_ascii_case(email) && Some(entry.id) != except)
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        if self.email_taken(&params.email, None) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }

        let now = self.tick();
        match self.usernames.entry(params.username.to_lowercase()) {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            }),
            Entry::Vacant(slot) => {
                let user = UserRecord {
                    id: Uuid::new_v4(),
                    username: params.username,
                    display_name: params.display_name,
                    email: params.email,
                    created_at: now,
                    updated_at: now,
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        if self.email_taken(&params.email, Some(params.id)) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }
        let now = self.tick();
        let mut entry = self.users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        entry.display_name = params.display_name;
        entry.email = params.email;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    /// Tokens go with the user, mirroring the foreign key cascade.
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let (_, removed) = self.users.remove(&id).ok_or(RepoError::NotFound)?;
        self.usernames.remove(&removed.username.to_lowercase());
        self.tokens.retain(|_, token| token.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl AuthorResolver for MemoryRepositories {
    async fn resolve_author_ids(&self, name: &str) -> Result<Vec<Uuid>, RepoError> {
        let wanted = name.trim().to_lowercase();
        let mut ids: Vec<Uuid> = self
            .users
            .iter()
            .filter(|entry| {
                entry.username.to_lowercase() == wanted
                    || entry.display_name.to_lowercase() == wanted
            })
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(username: &str, display_name: &str) -> CreateUserParams {
        CreateUserParams {
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: format!("{username}@example.com"),
        }
    }

    #[tokio::test]
    async fn author_names_resolve_case_insensitively() {
        let store = MemoryRepositories::default();
        let ada = store.create_user(params("ada", "Ada Lovelace")).await.unwrap();
        store.create_user(params("grace", "Grace")).await.unwrap();

        assert_eq!(store.resolve_author_ids("ADA").await.unwrap(), vec![ada.id]);
        assert_eq!(
            store.resolve_author_ids("ada lovelace").await.unwrap(),
            vec![ada.id]
        );
        assert!(store.resolve_author_ids("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn usernames_are_unique_ignoring_case() {
        let store = MemoryRepositories::default();
        store.create_user(params("ada", "Ada")).await.unwrap();
        let mut clash = params("ADA", "Other");
        clash.email = "other@example.com".into();

        let err = store.create_user(clash).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }
}
