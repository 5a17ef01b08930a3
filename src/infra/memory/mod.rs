//! In-process repositories backed by concurrent hash maps.
//!
//! Semantics follow the Postgres store: unknown foreign keys are rejected as
//! invalid input, deletes cascade, and every counter mutation updates the
//! counters and the engagement score under one entry lock.

mod comments;
mod interactions;
mod posts;
mod tokens;
mod users;

use std::sync::Mutex;

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::cache::lock::mutex_lock;
use crate::domain::entities::{
    CommentRecord, InteractionRecord, PostRecord, TokenRecord, UserRecord,
};
use crate::domain::scoring::ScoringConfig;

const SOURCE: &str = "infra::memory";

pub struct MemoryRepositories {
    posts: DashMap<Uuid, PostRecord>,
    comments: DashMap<Uuid, CommentRecord>,
    interactions: DashMap<Uuid, InteractionRecord>,
    /// `(user_id, post_id)` to interaction id; enforces one interaction per pair.
    interaction_index: DashMap<(Uuid, Uuid), Uuid>,
    users: DashMap<Uuid, UserRecord>,
    /// Lowercased username to user id.
    usernames: DashMap<String, Uuid>,
    tokens: DashMap<Uuid, TokenRecord>,
    scoring: ScoringConfig,
    last_timestamp: Mutex<OffsetDateTime>,
}

impl MemoryRepositories {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self {
            posts: DashMap::new(),
            comments: DashMap::new(),
            interactions: DashMap::new(),
            interaction_index: DashMap::new(),
            users: DashMap::new(),
            usernames: DashMap::new(),
            tokens: DashMap::new(),
            scoring,
            last_timestamp: Mutex::new(OffsetDateTime::UNIX_EPOCH),
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Insert a fully formed post, replacing any post with the same id.
    pub fn seed_post(&self, post: PostRecord) {
        self.posts.insert(post.id, post);
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    /// Wall-clock time, nudged forward so consecutive writes never share a
    /// timestamp and creation order stays observable.
    fn tick(&self) -> OffsetDateTime {
        let mut last = mutex_lock(&self.last_timestamp, SOURCE, "tick");
        let now = OffsetDateTime::now_utc().max(*last + Duration::microseconds(1));
        *last = now;
        now
    }
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
