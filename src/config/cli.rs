use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

use crate::application::search::SearchRequest;

const DEFAULT_RECONCILE_CONCURRENCY: usize = 4;

/// Command-line arguments for the Chorus binary.
#[derive(Debug, Parser)]
#[command(name = "chorus", version, about = "Chorus content backend tooling")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CHORUS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
    /// Run a filtered, ranked post search and print the page as JSON.
    Search(Box<SearchArgs>),
    /// Recompute post counters and engagement scores from stored rows.
    Reconcile(ReconcileArgs),
}

impl Command {
    pub fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Migrate(args) => &args.overrides,
            Command::Search(args) => &args.overrides,
            Command::Reconcile(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis URL used for caching.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Case-insensitive title substring.
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Author username or display name.
    #[arg(long = "author-name", value_name = "NAME")]
    pub author_name: Option<String>,

    /// Explicit author id; repeatable.
    #[arg(long = "author-id", value_name = "UUID")]
    pub author_ids: Vec<Uuid>,

    /// Tag to filter on; repeatable.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// `and` requires every tag, `or` any of them.
    #[arg(long = "tag-logic", value_name = "LOGIC")]
    pub tag_logic: Option<String>,

    /// Inclusive lower bound on creation time (YYYY-MM-DD or RFC 3339).
    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: Option<String>,

    /// Inclusive upper bound on creation time (YYYY-MM-DD or RFC 3339).
    #[arg(long = "end-date", value_name = "DATE")]
    pub end_date: Option<String>,

    /// How the identity and content criteria combine (`and` | `or`).
    #[arg(long = "global-logic", value_name = "LOGIC")]
    pub global_logic: Option<String>,

    /// `date`, `title` or `popularity`.
    #[arg(long = "sort-by", value_name = "FIELD")]
    pub sort_by: Option<String>,

    /// `asc` or `desc`.
    #[arg(long = "sort-order", value_name = "ORDER")]
    pub sort_order: Option<String>,

    #[arg(long, value_name = "N")]
    pub page: Option<i64>,

    #[arg(long, value_name = "N")]
    pub limit: Option<i64>,
}

impl SearchArgs {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            title: self.title.clone(),
            author_name: self.author_name.clone(),
            author_ids: self.author_ids.clone(),
            tags: self.tags.clone(),
            tag_logic: self.tag_logic.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            global_logic: self.global_logic.clone(),
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order.clone(),
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Reconcile a single post instead of every post.
    #[arg(long = "post", value_name = "UUID")]
    pub post: Option<Uuid>,

    /// Maximum number of posts reconciled concurrently.
    #[arg(long, default_value_t = DEFAULT_RECONCILE_CONCURRENCY, value_parser = clap::value_parser!(usize))]
    pub concurrency: usize,
}
