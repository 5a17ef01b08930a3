use std::{
    process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chorus::{
    application::{
        error::AppError,
        posts::PostService,
        repos::{AuthorResolver, InteractionsRepo, PostsRepo},
        search::SearchService,
    },
    cache::{
        CacheConfig, CacheService, CachedInteractionsRepo, CachedPostsRepo, MemoryCacheService,
    },
    config,
    infra::{
        db::PostgresRepositories, error::InfraError, redis_cache::RedisCacheService, telemetry,
    },
};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::internal(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Search(args) => run_search(settings, *args).await,
        config::Command::Reconcile(args) => run_reconcile(settings, args).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(target = "chorus::migrate", "Migrations applied");
    Ok(())
}

async fn run_search(settings: config::Settings, args: config::SearchArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let stores = build_stores(repositories, &settings).await?;

    let search = SearchService::new(
        stores.posts.clone(),
        stores.authors.clone(),
        settings.search.page_limits(),
        settings.scoring,
    );
    let posts = PostService::new(
        stores.posts,
        stores.interactions,
        search,
        settings.requests.timeout,
    );

    let results = posts.search_and_filter(&args.to_request()).await?;
    let rendered = serde_json::to_string_pretty(&results)
        .map_err(|err| AppError::internal(format!("failed to encode results: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_reconcile(
    settings: config::Settings,
    args: config::ReconcileArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let stores = build_stores(repositories, &settings).await?;
    let concurrency = args.concurrency.clamp(1, 32);

    let ids: Vec<Uuid> = match args.post {
        Some(id) => vec![id],
        None => stores.posts.list_post_ids().await?,
    };

    info!(
        target = "chorus::reconcile",
        posts = ids.len(),
        concurrency,
        "Starting reconcile"
    );

    let total = Arc::new(AtomicUsize::new(0));
    let counter = total.clone();
    let posts = stores.posts.clone();

    stream::iter(ids)
        .map(Ok::<_, AppError>)
        .try_for_each_concurrent(Some(concurrency), move |id| {
            let posts = posts.clone();
            let counter = counter.clone();
            async move {
                let post = posts.recount_engagement(id).await?;
                info!(
                    target = "chorus::reconcile",
                    post_id = %post.id,
                    likes = post.likes,
                    dislikes = post.dislikes,
                    comments = post.comment_count,
                    score = post.engagement_score,
                    "Reconciled post"
                );
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
        .await?;

    info!(
        target = "chorus::reconcile",
        posts = total.load(Ordering::Relaxed),
        "Reconcile finished"
    );
    Ok(())
}

/// Cache-decorated stores shared by the commands.
struct Stores {
    posts: Arc<dyn PostsRepo>,
    interactions: Arc<dyn InteractionsRepo>,
    authors: Arc<dyn AuthorResolver>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, &settings.database)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool, settings.scoring)))
}

async fn build_cache(config: &CacheConfig) -> Result<Arc<dyn CacheService>, AppError> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisCacheService::connect(url, config)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(target = "chorus::cache", backend = "redis", "Cache ready");
            Ok(Arc::new(redis))
        }
        None => {
            info!(target = "chorus::cache", backend = "memory", "Cache ready");
            Ok(Arc::new(MemoryCacheService::new(config)))
        }
    }
}

async fn build_stores(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<Stores, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = build_cache(&cache_config).await?;

    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let interactions_repo: Arc<dyn InteractionsRepo> = repositories.clone();
    let authors: Arc<dyn AuthorResolver> = repositories;

    Ok(Stores {
        posts: Arc::new(CachedPostsRepo::new(
            posts_repo,
            cache.clone(),
            cache_config.post_ttl(),
        )),
        interactions: Arc::new(CachedInteractionsRepo::new(
            interactions_repo,
            cache,
            cache_config.interaction_ttl(),
        )),
        authors,
    })
}
