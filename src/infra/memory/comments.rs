use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, DeletedThread, PageRequest, RepoError, SearchPage,
    UpdateCommentParams,
};
use crate::domain::entities::CommentRecord;

use super::MemoryRepositories;

impl MemoryRepositories {
    /// Remove every reply beneath `roots`, at any depth. Returns the removed
    /// ids.
    fn remove_descendants(&self, roots: &[Uuid]) -> Vec<Uuid> {
        let mut removed = Vec::new();
        let mut frontier = roots.to_vec();
        while let Some(parent) = frontier.pop() {
            let children: Vec<Uuid> = self
                .comments
                .iter()
                .filter(|entry| entry.parent_id == Some(parent))
                .map(|entry| entry.id)
                .collect();
            for child in children {
                if self.comments.remove(&child).is_some() {
                    removed.push(child);
                    frontier.push(child);
                }
            }
        }
        removed
    }

    fn page_of<F>(&self, page: PageRequest, keep: F) -> SearchPage<CommentRecord>
    where
        F: Fn(&CommentRecord) -> bool,
    {
        let mut matching: Vec<CommentRecord> = self
            .comments
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        SearchPage::new(page.slice(&matching), total)
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.posts.contains_key(&params.post_id) {
            return Err(RepoError::invalid_input("comment references an unknown post"));
        }
        if let Some(parent_id) = params.parent_id {
            if !self.comments.contains_key(&parent_id) {
                return Err(RepoError::invalid_input(
                    "comment references an unknown parent",
                ));
            }
        }

        let now = self.tick();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            parent_id: params.parent_id,
            author_id: Some(params.author_id),
            body: params.body,
            reply_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.comments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let now = self.tick();
        let mut entry = self
            .comments
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        entry.body = params.body;
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<DeletedThread, RepoError> {
        let (_, comment) = self.comments.remove(&id).ok_or(RepoError::NotFound)?;
        let descendants = self.remove_descendants(&[id]);
        Ok(DeletedThread {
            comment,
            descendants,
        })
    }

    async fn list_comments_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        Ok(self.page_of(page, |comment| {
            comment.post_id == post_id && comment.parent_id.is_none()
        }))
    }

    async fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        Ok(self.page_of(page, |comment| comment.parent_id == Some(parent_id)))
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        let mut entry = self.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        entry.reply_count += delta;
        Ok(())
    }

    async fn anonymize_author(&self, author_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let now = self.tick();
        let mut changed = Vec::new();
        for mut entry in self.comments.iter_mut() {
            if entry.author_id == Some(author_id) {
                entry.author_id = None;
                entry.updated_at = now;
                changed.push(entry.clone());
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{CreatePostParams, PostsRepo};

    async fn seeded() -> (MemoryRepositories, Uuid) {
        let store = MemoryRepositories::default();
        let post = store
            .create_post(CreatePostParams {
                title: "t".into(),
                body: String::new(),
                author_id: Uuid::new_v4(),
                tags: Vec::new(),
            })
            .await
            .unwrap();
        (store, post.id)
    }

    fn comment(post_id: Uuid, parent_id: Option<Uuid>) -> CreateCommentParams {
        CreateCommentParams {
            post_id,
            parent_id,
            author_id: Uuid::new_v4(),
            body: "hello".into(),
        }
    }

    #[tokio::test]
    async fn top_level_listing_excludes_replies() {
        let (store, post_id) = seeded().await;
        let root = store.create_comment(comment(post_id, None)).await.unwrap();
        store
            .create_comment(comment(post_id, Some(root.id)))
            .await
            .unwrap();

        let page = store
            .list_comments_by_post(post_id, PageRequest::new(1, 10).unwrap())
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, root.id);
    }

    #[tokio::test]
    async fn deleting_a_comment_removes_its_thread() {
        let (store, post_id) = seeded().await;
        let root = store.create_comment(comment(post_id, None)).await.unwrap();
        let reply = store
            .create_comment(comment(post_id, Some(root.id)))
            .await
            .unwrap();
        let nested = store
            .create_comment(comment(post_id, Some(reply.id)))
            .await
            .unwrap();

        let deleted = store.delete_comment(root.id).await.unwrap();

        assert_eq!(deleted.comment.id, root.id);
        let mut descendants = deleted.descendants.clone();
        descendants.sort();
        let mut expected = vec![reply.id, nested.id];
        expected.sort();
        assert_eq!(descendants, expected);
        assert_eq!(store.find_comment(nested.id).await.unwrap(), None);
        assert_eq!(store.comment_count(), 0);
    }

    #[tokio::test]
    async fn unknown_parents_are_rejected() {
        let (store, post_id) = seeded().await;
        let err = store
            .create_comment(comment(post_id, Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn anonymize_returns_changed_rows() {
        let (store, post_id) = seeded().await;
        let written = store.create_comment(comment(post_id, None)).await.unwrap();
        let author = written.author_id.unwrap();

        let changed = store.anonymize_author(author).await.unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].author_id, None);
    }
}
