#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chorus::application::{
    accounts::AccountService,
    comments::CommentService,
    posts::PostService,
    repos::{
        AuthorResolver, CommentsRepo, CreateCommentParams, DeletedThread, InteractionsRepo,
        PageRequest, PostsRepo, RepoError, SearchPage, TokensRepo, UpdateCommentParams,
        UsersRepo,
    },
    search::{PageLimits, SearchService},
    tasks::BackgroundTasks,
};
use chorus::cache::{
    CacheConfig, CacheService, CachedCommentsRepo, CachedInteractionsRepo, CachedPostsRepo,
    CachedTokensRepo, CachedUsersRepo, MemoryCacheService,
};
use chorus::domain::entities::{CommentRecord, PostRecord};
use chorus::domain::scoring::ScoringConfig;
use chorus::infra::memory::MemoryRepositories;
use time::OffsetDateTime;
use uuid::Uuid;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Comment store wrapper counting how often listings reach the store.
pub struct CountingComments {
    inner: Arc<MemoryRepositories>,
    listings: AtomicUsize,
}

impl CountingComments {
    pub fn new(inner: Arc<MemoryRepositories>) -> Self {
        Self {
            inner,
            listings: AtomicUsize::new(0),
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentsRepo for CountingComments {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.inner.create_comment(params).await
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        self.inner.find_comment(id).await
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.inner.update_comment(params).await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<DeletedThread, RepoError> {
        self.inner.delete_comment(id).await
    }

    async fn list_comments_by_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.list_comments_by_post(post_id, page).await
    }

    async fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<SearchPage<CommentRecord>, RepoError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.list_replies(parent_id, page).await
    }

    async fn increment_reply_count(&self, id: Uuid, delta: i64) -> Result<(), RepoError> {
        self.inner.increment_reply_count(id, delta).await
    }

    async fn anonymize_author(&self, author_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        self.inner.anonymize_author(author_id).await
    }
}

/// Services wired over the in-process store and cache.
pub struct Harness {
    pub store: Arc<MemoryRepositories>,
    pub comment_store: Arc<CountingComments>,
    pub cache: Arc<MemoryCacheService>,
    pub tasks: Arc<BackgroundTasks>,
    pub posts: PostService,
    pub comments: CommentService,
    pub accounts: AccountService,
    pub search: SearchService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_scoring(ScoringConfig::default())
    }

    pub fn with_scoring(scoring: ScoringConfig) -> Self {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryRepositories::new(scoring));
        let comment_store = Arc::new(CountingComments::new(store.clone()));
        let cache = Arc::new(MemoryCacheService::new(&config));
        let shared: Arc<dyn CacheService> = cache.clone();
        let tasks = Arc::new(BackgroundTasks::new(Duration::from_secs(5)));

        let posts_repo: Arc<dyn PostsRepo> = Arc::new(CachedPostsRepo::new(
            store.clone(),
            shared.clone(),
            config.post_ttl(),
        ));
        let comments_repo: Arc<dyn CommentsRepo> = Arc::new(CachedCommentsRepo::new(
            comment_store.clone(),
            shared.clone(),
            config.comment_ttl(),
            config.comment_list_ttl(),
        ));
        let interactions_repo: Arc<dyn InteractionsRepo> = Arc::new(CachedInteractionsRepo::new(
            store.clone(),
            shared.clone(),
            config.interaction_ttl(),
        ));
        let users_repo: Arc<dyn UsersRepo> = Arc::new(CachedUsersRepo::new(
            store.clone(),
            shared.clone(),
            config.user_ttl(),
        ));
        let tokens_repo: Arc<dyn TokensRepo> = Arc::new(CachedTokensRepo::new(
            store.clone(),
            shared,
            config.token_ttl(),
        ));
        let authors: Arc<dyn AuthorResolver> = store.clone();

        let search = SearchService::new(
            posts_repo.clone(),
            authors,
            PageLimits::default(),
            scoring,
        );
        let posts = PostService::new(
            posts_repo.clone(),
            interactions_repo,
            search.clone(),
            REQUEST_TIMEOUT,
        );
        let comments = CommentService::new(
            comments_repo.clone(),
            posts_repo,
            tasks.clone(),
            PageLimits::default(),
            REQUEST_TIMEOUT,
        );
        let accounts = AccountService::new(users_repo, tokens_repo, comments_repo, REQUEST_TIMEOUT);

        Self {
            store,
            comment_store,
            cache,
            tasks,
            posts,
            comments,
            accounts,
            search,
        }
    }
}

/// A post with `views` views and the engagement score those views earn.
pub fn seeded_post(
    title: &str,
    author_id: Uuid,
    tags: &[&str],
    created_at: OffsetDateTime,
    views: i64,
    scoring: &ScoringConfig,
) -> PostRecord {
    PostRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        body: String::new(),
        author_id,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        views,
        likes: 0,
        dislikes: 0,
        comment_count: 0,
        engagement_score: scoring.score_for(views, 0, 0, 0),
        created_at,
        updated_at: created_at,
    }
}
