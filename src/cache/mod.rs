//! Chorus cache layer.
//!
//! Decorators wrap each entity store with a [`CacheService`]:
//!
//! - **Point lookups** are read through `"<entity>:id:<id>"` keys and deleted
//!   after every successful update or delete.
//! - **Paginated comment reads** are cached per grouping, page and limit and
//!   registered in a tracker set, so a write to the grouping can delete every
//!   cached page at once.
//!
//! Cache faults are logged and counted, never returned to callers.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"
//! post_ttl_secs = 300
//! comment_list_ttl_secs = 60
//! # ... see config.rs for all options
//! ```

mod comments;
mod config;
mod interactions;
mod keys;
mod layer;
pub(crate) mod lock;
mod memory;
mod posts;
mod service;
mod tokens;
mod tracker;
mod users;

pub use comments::CachedCommentsRepo;
pub use config::CacheConfig;
pub use interactions::CachedInteractionsRepo;
pub use keys::{CommentGrouping, EntityKind, interaction_key};
pub use layer::{
    CacheLayer, METRIC_CACHE_FAULT, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED,
    METRIC_CACHE_MISS,
};
pub use memory::{METRIC_CACHE_EVICT, MemoryCacheService};
pub use posts::CachedPostsRepo;
pub use service::{CacheError, CacheService};
pub use tokens::CachedTokensRepo;
pub use tracker::TrackerSet;
pub use users::CachedUsersRepo;
