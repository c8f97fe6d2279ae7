use async_trait::async_trait;
use prep_core::model::{
    AnswerKey, AnsweredEntry, Difficulty, ExamId, Question, QuestionId, SessionSummary, SubjectId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of a bank question: what the learner sees plus its answer key.
///
/// The answer key never leaves storage through `list_questions`; it is only
/// reachable through `QuestionRepository::answer_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub exam_id: ExamId,
    pub question: Question,
    pub answer_key: AnswerKey,
}

impl QuestionRecord {
    #[must_use]
    pub fn new(exam_id: ExamId, question: Question, answer_key: AnswerKey) -> Self {
        Self {
            exam_id,
            question,
            answer_key,
        }
    }
}

/// Repository contract for the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question or replace its content, keeping its original position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, record: &QuestionRecord) -> Result<(), StorageError>;

    /// List questions for an exam subject in insertion order, filtered by difficulty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. An unknown subject yields an empty list.
    async fn list_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, StorageError>;

    /// Fetch the grading key for a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn answer_key(&self, question_id: &QuestionId) -> Result<AnswerKey, StorageError>;
}

/// A persisted summary together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummaryRow {
    pub id: i64,
    pub summary: SessionSummary,
}

impl SessionSummaryRow {
    #[must_use]
    pub fn new(id: i64, summary: SessionSummary) -> Self {
        Self { id, summary }
    }
}

/// Repository contract for completed session results.
#[async_trait]
pub trait SessionSummaryRepository: Send + Sync {
    /// Store a summary and its answered log. Returns the new row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session was already stored.
    async fn append_summary(
        &self,
        summary: &SessionSummary,
        answers: &[AnsweredEntry],
    ) -> Result<i64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError>;

    /// Answered log for a stored summary, in presentation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the id is unknown.
    async fn list_answers(&self, id: i64) -> Result<Vec<AnsweredEntry>, StorageError>;

    /// Newest-first summaries for an exam subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_summary_rows(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        limit: u32,
    ) -> Result<Vec<SessionSummaryRow>, StorageError>;
}

#[derive(Debug, Clone)]
struct StoredSummary {
    summary: SessionSummary,
    answers: Vec<AnsweredEntry>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Vec<QuestionRecord>>>,
    summaries: Arc<Mutex<HashMap<i64, StoredSummary>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, record: &QuestionRecord) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        match guard
            .iter_mut()
            .find(|r| r.question.id() == record.question.id())
        {
            Some(existing) => *existing = record.clone(),
            None => guard.push(record.clone()),
        }
        Ok(())
    }

    async fn list_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|r| &r.exam_id == exam_id && r.question.subject_id() == subject_id)
            .filter(|r| difficulty.admits(r.question.level()))
            .map(|r| r.question.clone())
            .collect())
    }

    async fn answer_key(&self, question_id: &QuestionId) -> Result<AnswerKey, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|r| r.question.id() == question_id)
            .map(|r| r.answer_key.clone())
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SessionSummaryRepository for InMemoryRepository {
    async fn append_summary(
        &self,
        summary: &SessionSummary,
        answers: &[AnsweredEntry],
    ) -> Result<i64, StorageError> {
        let mut guard = self.summaries.lock().map_err(poisoned)?;
        if guard
            .values()
            .any(|s| s.summary.session_id() == summary.session_id())
        {
            return Err(StorageError::Conflict);
        }
        let id = guard.keys().copied().max().unwrap_or(0) + 1;
        guard.insert(
            id,
            StoredSummary {
                summary: summary.clone(),
                answers: answers.to_vec(),
            },
        );
        Ok(id)
    }

    async fn get_summary(&self, id: i64) -> Result<SessionSummary, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        guard
            .get(&id)
            .map(|s| s.summary.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_answers(&self, id: i64) -> Result<Vec<AnsweredEntry>, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        guard
            .get(&id)
            .map(|s| s.answers.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_summary_rows(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        limit: u32,
    ) -> Result<Vec<SessionSummaryRow>, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        let mut rows: Vec<SessionSummaryRow> = guard
            .iter()
            .filter(|(_, s)| {
                s.summary.exam_id() == exam_id && s.summary.subject_id() == subject_id
            })
            .map(|(id, s)| SessionSummaryRow::new(*id, s.summary.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.summary
                .completed_at()
                .cmp(&a.summary.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub session_summaries: Arc<dyn SessionSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let session_summaries: Arc<dyn SessionSummaryRepository> = Arc::new(repo);
        Self {
            questions,
            session_summaries,
        }
    }
}
