use chrono::{DateTime, Utc};
use std::sync::Arc;

use prep_core::model::{AnsweredEntry, CompletionReason, ExamId, SessionSummary, SubjectId};
use storage::repository::{SessionSummaryRepository, SessionSummaryRow};

use crate::error::SessionError;

/// Storage identifier for a persisted session summary (`SQLite` row id).
pub type SessionSummaryId = i64;

/// Presentation-agnostic history entry; formatting is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistoryItem {
    pub id: SessionSummaryId,
    pub completed_at: DateTime<Utc>,
    pub score: u32,
    pub total: u32,
    pub answered: u32,
    pub reason: CompletionReason,
}

impl SessionHistoryItem {
    #[must_use]
    pub fn from_row(row: &SessionSummaryRow) -> Self {
        Self::from_summary(row.id, &row.summary)
    }

    #[must_use]
    pub fn from_summary(id: SessionSummaryId, summary: &SessionSummary) -> Self {
        Self {
            id,
            completed_at: summary.completed_at(),
            score: summary.score(),
            total: summary.total(),
            answered: summary.answered(),
            reason: summary.reason(),
        }
    }
}

/// Read side of persisted sessions.
#[derive(Clone)]
pub struct SessionHistoryService {
    summaries: Arc<dyn SessionSummaryRepository>,
}

impl SessionHistoryService {
    #[must_use]
    pub fn new(summaries: Arc<dyn SessionSummaryRepository>) -> Self {
        Self { summaries }
    }

    /// Newest-first summaries for an exam subject.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        limit: u32,
    ) -> Result<Vec<SessionHistoryItem>, SessionError> {
        let rows = self
            .summaries
            .list_summary_rows(exam_id, subject_id, limit)
            .await?;
        Ok(rows.iter().map(SessionHistoryItem::from_row).collect())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the summary does not exist.
    pub async fn get_summary(&self, id: SessionSummaryId) -> Result<SessionSummary, SessionError> {
        Ok(self.summaries.get_summary(id).await?)
    }

    /// Answered log of a persisted session, in answer order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the summary does not exist.
    pub async fn answers(&self, id: SessionSummaryId) -> Result<Vec<AnsweredEntry>, SessionError> {
        Ok(self.summaries.list_answers(id).await?)
    }
}
