//! Cache key definitions.
//!
//! Point lookups use `"<entity>:id:<id>"`. Paginated comment reads are keyed
//! per grouping, page and limit, and every such key is recorded in the
//! grouping's tracker set.

use std::fmt;

use uuid::Uuid;

use crate::application::repos::PageRequest;
use crate::domain::entities::CommentRecord;

/// Entity families with cached point lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Post,
    Comment,
    Interaction,
    User,
    Token,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
            EntityKind::Interaction => "interaction",
            EntityKind::User => "user",
            EntityKind::Token => "token",
        }
    }

    pub fn id_key(self, id: Uuid) -> String {
        format!("{}:id:{id}", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactions are looked up by their (user, post) pair.
pub fn interaction_key(user_id: Uuid, post_id: Uuid) -> String {
    format!("interaction:user:{user_id}:post:{post_id}")
}

/// Logical scope under which comment pages are tracked together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentGrouping {
    /// Top-level comments under a post.
    Post(Uuid),
    /// Direct replies under a comment.
    Replies(Uuid),
}

impl CommentGrouping {
    /// The single grouping a comment belongs to: its parent's replies when it
    /// has a parent, otherwise its post's top-level comments.
    pub fn of(comment: &CommentRecord) -> Self {
        match comment.parent_id {
            Some(parent_id) => CommentGrouping::Replies(parent_id),
            None => CommentGrouping::Post(comment.post_id),
        }
    }

    fn prefix(&self) -> String {
        match self {
            CommentGrouping::Post(post_id) => format!("comment:post:{post_id}"),
            CommentGrouping::Replies(parent_id) => format!("comment:replies:{parent_id}"),
        }
    }

    pub fn page_key(&self, page: PageRequest) -> String {
        format!(
            "{}:page:{}:limit:{}",
            self.prefix(),
            page.page(),
            page.limit()
        )
    }

    pub fn tracker_key(&self) -> String {
        format!("{}:tracker", self.prefix())
    }
}
