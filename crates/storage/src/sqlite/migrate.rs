use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

pub const LATEST_VERSION: i64 = 1;

/// Highest recorded migration, `0` when none has run yet.
pub async fn applied_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
    )
    .fetch_optional(pool)
    .await?;
    if exists.is_none() {
        return Ok(0);
    }
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Runs the versioned schema migrations.
///
/// Version 1 creates the question bank (questions, options) and session
/// results (summaries, answered log).
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        // `seq` preserves insertion order across upserts.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    exam_id TEXT NOT NULL,
                    subject_id TEXT NOT NULL,
                    prompt TEXT NOT NULL,
                    level TEXT NOT NULL CHECK (level IN ('easy', 'medium', 'hard')),
                    correct_answer TEXT NOT NULL,
                    explanation TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_options (
                    question_id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    option_id TEXT NOT NULL,
                    text TEXT NOT NULL,
                    PRIMARY KEY (question_id, option_id),
                    FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_summaries (
                    id INTEGER PRIMARY KEY,
                    session_id BLOB NOT NULL UNIQUE,
                    exam_id TEXT NOT NULL,
                    subject_id TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total INTEGER NOT NULL CHECK (total >= 0),
                    answered INTEGER NOT NULL CHECK (answered >= 0),
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    reason TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_answers (
                    summary_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    question_id TEXT NOT NULL,
                    selected TEXT NOT NULL,
                    correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
                    time_spent_ms INTEGER NOT NULL CHECK (time_spent_ms >= 0),
                    PRIMARY KEY (summary_id, position),
                    FOREIGN KEY (summary_id) REFERENCES session_summaries(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_exam_subject
                    ON questions (exam_id, subject_id, seq);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_summaries_subject_completed
                    ON session_summaries (exam_id, subject_id, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
