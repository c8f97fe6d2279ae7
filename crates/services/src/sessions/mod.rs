mod controller;
mod history;
mod progress;
mod scheduler;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{
    AdvanceOutcome, ResumeTo, SessionController, SessionPhase, SubmitRequest, TickOutcome,
};
pub use history::{SessionHistoryItem, SessionHistoryService, SessionSummaryId};
pub use progress::SessionProgress;
pub use scheduler::{ManualScheduler, TickCallback, TickHandle, TickScheduler, TokioScheduler};
pub use workflow::{
    QuestionSource, RepositoryQuestions, SessionEvent, SessionLoopService, TICK_INTERVAL,
};
