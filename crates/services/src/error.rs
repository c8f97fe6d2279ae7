//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::model::{OptionId, QuestionError, QuestionId, SessionSummaryError};
use prep_core::sequencer::SequenceError;
use storage::repository::StorageError;

use crate::sessions::SessionPhase;

/// Errors emitted by the remote exam API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("api request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("api returned an invalid question: {0}")]
    InvalidQuestion(#[from] QuestionError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failure of an answer evaluator. Always transient from the session's point of view.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("question {0} is unknown to the evaluator")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("session already completed")]
    Completed,
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("no answer selected")]
    NoSelection,
    #[error("option {0} does not belong to the current question")]
    UnknownOption(OptionId),
    #[error("submission does not match the pending question")]
    StaleSubmission,
    #[error("stop was not requested")]
    StopNotRequested,
    #[error("answer evaluation failed: {0}")]
    EvaluationFailed(#[from] EvaluationError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// True for failures the learner can simply retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EvaluationFailed(_))
    }
}
