use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{QuestionRepository, SessionSummaryRepository, Storage};

mod mapping;
mod migrate;
mod question_repo;
mod session_summary_repo;

/// Highest schema version `migrate` knows how to apply.
pub const SCHEMA_VERSION: i64 = migrate::LATEST_VERSION;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("invalid sqlite url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool on `database_url`, creating the file when missing. Every
    /// connection enforces foreign keys so deleting a question drops its options.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::InvalidUrl` for an unparsable URL, or
    /// `SqliteInitError::Sqlx` when the pool cannot connect.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| SqliteInitError::InvalidUrl {
                url: database_url.to_owned(),
                source,
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        tracing::debug!(url = database_url, "sqlite pool connected");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Latest applied schema version, `0` before the first migration.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Sqlx` if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64, SqliteInitError> {
        Ok(migrate::applied_version(&self.pool).await?)
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let session_summaries: Arc<dyn SessionSummaryRepository> = Arc::new(repo);
        Ok(Self {
            questions,
            session_summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_reported_with_the_url() {
        let Err(err) = SqliteRepository::connect("sqlite:file:bad?bogus=1").await else {
            panic!("expected an invalid url error");
        };
        assert!(matches!(
            err,
            SqliteInitError::InvalidUrl { ref url, .. } if url == "sqlite:file:bad?bogus=1"
        ));
    }
}
