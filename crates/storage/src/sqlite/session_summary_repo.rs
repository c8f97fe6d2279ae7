use prep_core::model::{AnsweredEntry, ExamId, SessionSummary, SubjectId};

use super::SqliteRepository;
use super::mapping::{
    conn, i64_from_u64, i64_from_usize, map_answer_row, map_summary_row, map_summary_row_with_id,
};
use crate::repository::{SessionSummaryRepository, SessionSummaryRow, StorageError};

#[async_trait::async_trait]
impl SessionSummaryRepository for SqliteRepository {
    async fn append_summary(
        &self,
        summary: &SessionSummary,
        answers: &[AnsweredEntry],
    ) -> Result<i64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO session_summaries (
                    session_id, exam_id, subject_id, score, total, answered,
                    started_at, completed_at, reason
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(summary.session_id().value())
        .bind(summary.exam_id().as_str())
        .bind(summary.subject_id().as_str())
        .bind(i64::from(summary.score()))
        .bind(i64::from(summary.total()))
        .bind(i64::from(summary.answered()))
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .bind(summary.reason().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;
        let summary_id = res.last_insert_rowid();

        for entry in answers {
            sqlx::query(
                r"
                    INSERT INTO session_answers (
                        summary_id, position, question_id, selected, correct, time_spent_ms
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(summary_id)
            .bind(i64_from_usize("position", entry.index)?)
            .bind(entry.question_id.as_str())
            .bind(entry.selected.as_str())
            .bind(entry.correct)
            .bind(i64_from_u64("time_spent_ms", entry.time_spent_ms)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(summary_id)
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    session_id, exam_id, subject_id, score, total, answered,
                    started_at, completed_at, reason
                FROM session_summaries
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_summary_row(&row)
    }

    async fn list_answers(&self, id: i64) -> Result<Vec<AnsweredEntry>, StorageError> {
        let exists = sqlx::query("SELECT 1 FROM session_summaries WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let rows = sqlx::query(
            r"
                SELECT position, question_id, selected, correct, time_spent_ms
                FROM session_answers
                WHERE summary_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }

    async fn list_summary_rows(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        limit: u32,
    ) -> Result<Vec<SessionSummaryRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, exam_id, subject_id, score, total, answered,
                    started_at, completed_at, reason
                FROM session_summaries
                WHERE exam_id = ?1 AND subject_id = ?2
                ORDER BY completed_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(exam_id.as_str())
        .bind(subject_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_summary_row_with_id(&row)?);
        }
        Ok(out)
    }
}
