#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod evaluator;
pub mod sessions;

pub use prep_core::Clock;
pub use sessions as session;

pub use api::{ApiClient, ApiConfig};
pub use error::{ApiError, EvaluationError, SessionError};
pub use evaluator::{AnswerEvaluator, AnswerKeyEvaluator};

pub use sessions::{
    AdvanceOutcome, QuestionSource, RepositoryQuestions, SessionController, SessionEvent,
    SessionHistoryItem, SessionHistoryService, SessionLoopService, SessionPhase, SessionProgress,
    TickOutcome,
};
