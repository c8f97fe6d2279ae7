use prep_core::model::{
    AnsweredEntry, CompletionReason, ExamId, OptionId, QuestionId, SessionId, SessionSummary,
    SubjectId,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{SessionSummaryRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn i64_from_usize(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_summary_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSummary, StorageError> {
    let session_id = SessionId::from_uuid(row.try_get::<Uuid, _>("session_id").map_err(ser)?);
    let exam_id = ExamId::new(row.try_get::<String, _>("exam_id").map_err(ser)?);
    let subject_id = SubjectId::new(row.try_get::<String, _>("subject_id").map_err(ser)?);
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let total = u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?;
    let answered = u32_from_i64("answered", row.try_get::<i64, _>("answered").map_err(ser)?)?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let reason =
        CompletionReason::parse(&row.try_get::<String, _>("reason").map_err(ser)?).map_err(ser)?;

    SessionSummary::from_persisted(
        session_id,
        exam_id,
        subject_id,
        score,
        total,
        answered,
        started_at,
        completed_at,
        reason,
    )
    .map_err(ser)
}

pub(crate) fn map_summary_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SessionSummaryRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let summary = map_summary_row(row)?;
    Ok(SessionSummaryRow::new(id, summary))
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnsweredEntry, StorageError> {
    let index = usize_from_i64("position", row.try_get::<i64, _>("position").map_err(ser)?)?;
    let time_spent_ms = u64::try_from(row.try_get::<i64, _>("time_spent_ms").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("negative time_spent_ms".into()))?;

    Ok(AnsweredEntry {
        index,
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?),
        selected: OptionId::new(row.try_get::<String, _>("selected").map_err(ser)?),
        correct: row.try_get::<bool, _>("correct").map_err(ser)?,
        time_spent_ms,
    })
}
