use std::sync::Arc;

use async_trait::async_trait;
use prep_core::model::{AnswerResult, OptionId, QuestionId};
use storage::repository::{QuestionRepository, StorageError};

use crate::error::EvaluationError;

/// Grades a single submission. May cross an I/O boundary.
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    /// # Errors
    ///
    /// Returns `EvaluationError` on transport or lookup failure.
    async fn submit(
        &self,
        question_id: &QuestionId,
        selected: &OptionId,
    ) -> Result<AnswerResult, EvaluationError>;
}

/// Grades against answer keys held in a question repository.
#[derive(Clone)]
pub struct AnswerKeyEvaluator {
    questions: Arc<dyn QuestionRepository>,
}

impl AnswerKeyEvaluator {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }
}

#[async_trait]
impl AnswerEvaluator for AnswerKeyEvaluator {
    async fn submit(
        &self,
        question_id: &QuestionId,
        selected: &OptionId,
    ) -> Result<AnswerResult, EvaluationError> {
        let key = match self.questions.answer_key(question_id).await {
            Ok(key) => key,
            Err(StorageError::NotFound) => {
                return Err(EvaluationError::UnknownQuestion(question_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(key.grade(selected))
    }
}
