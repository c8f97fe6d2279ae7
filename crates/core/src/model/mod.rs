mod answer;
mod config;
mod ids;
mod question;
mod session;

pub use ids::{ExamId, OptionId, QuestionId, SessionId, SubjectId};

pub use answer::{AnswerKey, AnswerResult, AnsweredEntry, Explanation};
pub use config::{DEFAULT_QUESTION_COUNT, Difficulty, SessionConfig, SessionMode};
pub use question::{AnswerOption, Question, QuestionError, QuestionLevel};
pub use session::{CompletionReason, SessionSummary, SessionSummaryError, format_elapsed};
