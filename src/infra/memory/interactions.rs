use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::application::repos::{CreateInteractionParams, InteractionsRepo, RepoError};
use crate::domain::entities::InteractionRecord;
use crate::domain::types::InteractionAction;

use super::MemoryRepositories;

const UNIQUE_USER_POST: &str = "interactions_user_post_key";

#[async_trait]
impl InteractionsRepo for MemoryRepositories {
    async fn create_interaction(
        &self,
        params: CreateInteractionParams,
    ) -> Result<InteractionRecord, RepoError> {
        if !self.posts.contains_key(&params.post_id) {
            return Err(RepoError::invalid_input(
                "interaction references an unknown post",
            ));
        }

        let now = self.tick();
        match self
            .interaction_index
            .entry((params.user_id, params.post_id))
        {
            Entry::Occupied(_) => Err(RepoError::Duplicate {
                constraint: UNIQUE_USER_POST.to_string(),
            }),
            Entry::Vacant(slot) => {
                let interaction = InteractionRecord {
                    id: Uuid::new_v4(),
                    user_id: params.user_id,
                    post_id: params.post_id,
                    action: params.action,
                    created_at: now,
                    updated_at: now,
                };
                self.interactions
                    .insert(interaction.id, interaction.clone());
                slot.insert(interaction.id);
                Ok(interaction)
            }
        }
    }

    async fn find_interaction(
        &self,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        let Some(id) = self
            .interaction_index
            .get(&(user_id, post_id))
            .map(|entry| *entry.value())
        else {
            return Ok(None);
        };
        Ok(self.interactions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_interaction_action(
        &self,
        existing: &InteractionRecord,
        action: InteractionAction,
    ) -> Result<Option<InteractionRecord>, RepoError> {
        let now = self.tick();
        let Some(mut entry) = self.interactions.get_mut(&existing.id) else {
            return Ok(None);
        };
        if entry.action != existing.action {
            return Ok(None);
        }
        entry.action = action;
        entry.updated_at = now;
        Ok(Some(entry.clone()))
    }

    async fn delete_interaction(&self, id: Uuid) -> Result<InteractionRecord, RepoError> {
        let (_, removed) = self.interactions.remove(&id).ok_or(RepoError::NotFound)?;
        self.interaction_index
            .remove(&(removed.user_id, removed.post_id));
        Ok(removed)
    }
}
