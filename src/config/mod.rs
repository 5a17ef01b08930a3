//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, CommonOverrides, MigrateArgs, ReconcileArgs, SearchArgs};

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::search::PageLimits;
use crate::cache::CacheConfig;
use crate::domain::scoring::ScoringConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "chorus";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_COUNTER_DEADLINE_MS: u64 = 5_000;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub scoring: ScoringConfig,
    pub search: SearchSettings,
    pub requests: RequestSettings,
    pub tasks: TaskSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    pub memory_capacity: NonZeroUsize,
    pub op_timeout: Duration,
    pub post_ttl: Duration,
    pub comment_ttl: Duration,
    pub comment_list_ttl: Duration,
    pub interaction_ttl: Duration,
    pub user_ttl: Duration,
    pub token_ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub default_limit: NonZeroU32,
    pub max_limit: NonZeroU32,
}

impl SearchSettings {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_limit.get(),
            max_limit: self.max_limit.get(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSettings {
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct TaskSettings {
    pub counter_deadline: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CHORUS").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    scoring: RawScoringSettings,
    search: RawSearchSettings,
    requests: RawRequestSettings,
    tasks: RawTaskSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            scoring,
            search,
            requests,
            tasks,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            scoring: build_scoring_settings(scoring)?,
            search: build_search_settings(search)?,
            requests: RequestSettings {
                timeout: positive_millis(
                    requests.timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
                    "requests.timeout_ms",
                )?,
            },
            tasks: TaskSettings {
                counter_deadline: positive_millis(
                    tasks
                        .counter_deadline_ms
                        .unwrap_or(DEFAULT_COUNTER_DEADLINE_MS),
                    "tasks.counter_deadline_ms",
                )?,
            },
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;
    let acquire_timeout = positive_millis(
        database
            .acquire_timeout_ms
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_MS),
        "database.acquire_timeout_ms",
    )?;
    let statement_timeout = positive_millis(
        database
            .statement_timeout_ms
            .unwrap_or(DEFAULT_DB_STATEMENT_TIMEOUT_MS),
        "database.statement_timeout_ms",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout,
        statement_timeout,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let memory_capacity = NonZeroUsize::new(
        cache
            .memory_capacity
            .unwrap_or(defaults.memory_capacity),
    )
    .ok_or_else(|| LoadError::invalid("cache.memory_capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        redis_url: non_blank(cache.redis_url),
        memory_capacity,
        op_timeout: positive_millis(
            cache.op_timeout_ms.unwrap_or(defaults.op_timeout_ms),
            "cache.op_timeout_ms",
        )?,
        post_ttl: positive_secs(
            cache.post_ttl_secs.unwrap_or(defaults.post_ttl_secs),
            "cache.post_ttl_secs",
        )?,
        comment_ttl: positive_secs(
            cache.comment_ttl_secs.unwrap_or(defaults.comment_ttl_secs),
            "cache.comment_ttl_secs",
        )?,
        comment_list_ttl: positive_secs(
            cache
                .comment_list_ttl_secs
                .unwrap_or(defaults.comment_list_ttl_secs),
            "cache.comment_list_ttl_secs",
        )?,
        interaction_ttl: positive_secs(
            cache
                .interaction_ttl_secs
                .unwrap_or(defaults.interaction_ttl_secs),
            "cache.interaction_ttl_secs",
        )?,
        user_ttl: positive_secs(
            cache.user_ttl_secs.unwrap_or(defaults.user_ttl_secs),
            "cache.user_ttl_secs",
        )?,
        token_ttl: positive_secs(
            cache.token_ttl_secs.unwrap_or(defaults.token_ttl_secs),
            "cache.token_ttl_secs",
        )?,
    })
}

fn build_scoring_settings(scoring: RawScoringSettings) -> Result<ScoringConfig, LoadError> {
    let defaults = ScoringConfig::default();
    ScoringConfig {
        like_weight: scoring.like_weight.unwrap_or(defaults.like_weight),
        dislike_weight: scoring.dislike_weight.unwrap_or(defaults.dislike_weight),
        view_weight: scoring.view_weight.unwrap_or(defaults.view_weight),
        comment_weight: scoring.comment_weight.unwrap_or(defaults.comment_weight),
        gravity: scoring.gravity.unwrap_or(defaults.gravity),
    }
    .validate()
    .map_err(|err| LoadError::invalid("scoring", err.to_string()))
}

fn build_search_settings(search: RawSearchSettings) -> Result<SearchSettings, LoadError> {
    let defaults = PageLimits::default();
    let default_limit = non_zero_u32(
        search.default_limit.unwrap_or(defaults.default_limit).into(),
        "search.default_limit",
    )?;
    let max_limit = non_zero_u32(
        search.max_limit.unwrap_or(defaults.max_limit).into(),
        "search.max_limit",
    )?;
    if default_limit > max_limit {
        return Err(LoadError::invalid(
            "search.default_limit",
            "must not exceed search.max_limit",
        ));
    }

    Ok(SearchSettings {
        default_limit,
        max_limit,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_ms: Option<u64>,
    statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    redis_url: Option<String>,
    memory_capacity: Option<usize>,
    op_timeout_ms: Option<u64>,
    post_ttl_secs: Option<u64>,
    comment_ttl_secs: Option<u64>,
    comment_list_ttl_secs: Option<u64>,
    interaction_ttl_secs: Option<u64>,
    user_ttl_secs: Option<u64>,
    token_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScoringSettings {
    like_weight: Option<f64>,
    dislike_weight: Option<f64>,
    view_weight: Option<f64>,
    comment_weight: Option<f64>,
    gravity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSearchSettings {
    default_limit: Option<u32>,
    max_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRequestSettings {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTaskSettings {
    counter_deadline_ms: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
