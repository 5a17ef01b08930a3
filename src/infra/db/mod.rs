//! Postgres-backed repository implementations.

mod comments;
mod interactions;
mod posts;
mod tokens;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::{
    query,
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
};

use crate::application::repos::RepoError;
use crate::config::DatabaseSettings;
use crate::domain::scoring::ScoringConfig;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
    scoring: ScoringConfig,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool, scoring: ScoringConfig) -> Self {
        Self {
            pool: Arc::new(pool),
            scoring,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Build a pool whose sessions cancel any statement running longer than
    /// `statement_timeout`.
    pub async fn connect(url: &str, settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
        let options = PgConnectOptions::from_str(url)?.options([(
            "statement_timeout",
            settings.statement_timeout.as_millis().to_string(),
        )]);
        PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
