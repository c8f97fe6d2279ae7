use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rng;
use rand::seq::SliceRandom;
use tokio::sync::mpsc::UnboundedSender;

use prep_core::model::{
    AnswerResult, Difficulty, ExamId, Question, SessionConfig, SessionId, SessionSummary,
    SubjectId,
};
use storage::repository::{QuestionRepository, SessionSummaryRepository};

use super::controller::{AdvanceOutcome, SessionController, SubmitRequest, TickOutcome};
use super::scheduler::{TickHandle, TickScheduler};
use crate::Clock;
use crate::error::{EvaluationError, SessionError};
use crate::evaluator::AnswerEvaluator;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Where a session's question pool comes from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `SessionError` when the pool cannot be loaded.
    async fn load_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, SessionError>;
}

/// Question pool backed by a `QuestionRepository`.
#[derive(Clone)]
pub struct RepositoryQuestions {
    repo: Arc<dyn QuestionRepository>,
}

impl RepositoryQuestions {
    #[must_use]
    pub fn new(repo: Arc<dyn QuestionRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl QuestionSource for RepositoryQuestions {
    async fn load_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, SessionError> {
        Ok(self
            .repo
            .list_questions(exam_id, subject_id, difficulty)
            .await?)
    }
}

/// Events delivered to the task that owns a `SessionController`.
#[derive(Debug)]
pub enum SessionEvent {
    Tick,
    Evaluated {
        request: SubmitRequest,
        outcome: Result<AnswerResult, EvaluationError>,
    },
}

/// Orchestrates session start, evaluation, ticking, and summary persistence.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    questions: Arc<dyn QuestionSource>,
    summaries: Arc<dyn SessionSummaryRepository>,
    evaluator: Arc<dyn AnswerEvaluator>,
    shuffle: bool,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        summaries: Arc<dyn SessionSummaryRepository>,
        evaluator: Arc<dyn AnswerEvaluator>,
    ) -> Self {
        Self {
            clock,
            questions,
            summaries,
            evaluator,
            shuffle: false,
        }
    }

    /// Shuffle the pool before it is truncated to the configured count.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Load the pool for `exam_id`/`subject_id` and start a session over it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when no question matches, or the loading error.
    pub async fn start_session(
        &self,
        exam_id: ExamId,
        subject_id: SubjectId,
        config: SessionConfig,
    ) -> Result<SessionController, SessionError> {
        let mut questions = self
            .questions
            .load_questions(&exam_id, &subject_id, config.difficulty())
            .await?;
        if self.shuffle {
            let mut rng = rng();
            questions.as_mut_slice().shuffle(&mut rng);
        }
        tracing::debug!(
            exam = %exam_id,
            subject = %subject_id,
            pool = questions.len(),
            "question pool loaded"
        );

        SessionController::new(
            SessionId::generate(),
            exam_id,
            subject_id,
            config,
            questions,
            self.clock.now(),
        )
    }

    /// Submit the current selection and wait for the evaluator.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for invalid transitions or evaluation failures.
    pub async fn submit_current(
        &self,
        session: &mut SessionController,
    ) -> Result<AnswerResult, SessionError> {
        let result = session
            .submit(self.evaluator.as_ref(), self.clock.now())
            .await?;
        Ok(result.clone())
    }

    /// Start evaluating the current selection on a background task.
    ///
    /// The outcome arrives on `events` as `SessionEvent::Evaluated`; pass it to
    /// `finish_submit`. Ticks keep flowing in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot submit right now.
    pub fn spawn_evaluation(
        &self,
        session: &mut SessionController,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<SubmitRequest, SessionError> {
        let request = session.begin_submit(self.clock.now())?;
        let evaluator = Arc::clone(&self.evaluator);
        let pending = request.clone();
        tokio::spawn(async move {
            let outcome = evaluator
                .submit(&pending.question_id, &pending.selected)
                .await;
            if events
                .send(SessionEvent::Evaluated {
                    request: pending,
                    outcome,
                })
                .is_err()
            {
                tracing::debug!("session closed before evaluation finished");
            }
        });
        Ok(request)
    }

    /// Apply an evaluation outcome delivered through `SessionEvent::Evaluated`.
    ///
    /// # Errors
    ///
    /// See `SessionController::finish_submit`.
    pub fn finish_submit(
        &self,
        session: &mut SessionController,
        request: &SubmitRequest,
        outcome: Result<AnswerResult, EvaluationError>,
    ) -> Result<AnswerResult, SessionError> {
        let result = session.finish_submit(request, outcome, self.clock.now())?;
        Ok(result.clone())
    }

    /// Move past the reviewed question; persists the summary after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for invalid transitions.
    pub async fn advance(
        &self,
        session: &mut SessionController,
    ) -> Result<AdvanceOutcome, SessionError> {
        let outcome = session.advance(self.clock.now())?;
        if matches!(outcome, AdvanceOutcome::Completed(_)) {
            self.persist(session).await;
        }
        Ok(outcome)
    }

    /// Apply one tick; persists the summary when time runs out.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the summary cannot be built.
    pub async fn tick(&self, session: &mut SessionController) -> Result<TickOutcome, SessionError> {
        let outcome = session.tick(self.clock.now())?;
        if matches!(outcome, TickOutcome::Expired(_)) {
            self.persist(session).await;
        }
        Ok(outcome)
    }

    /// Complete a stop the learner confirmed and persist the summary.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StopNotRequested` without a prior `request_stop`.
    pub async fn confirm_stop(
        &self,
        session: &mut SessionController,
    ) -> Result<SessionSummary, SessionError> {
        let summary = session.confirm_stop(self.clock.now())?;
        self.persist(session).await;
        Ok(summary)
    }

    /// Retry summary persistence after a completed session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session has not completed.
    /// Returns `SessionError::Storage` if persistence fails.
    pub async fn finalize_summary(
        &self,
        session: &mut SessionController,
    ) -> Result<i64, SessionError> {
        if let Some(id) = session.summary_id() {
            return Ok(id);
        }
        let summary = session.summary().ok_or(SessionError::Completed)?;
        let id = self
            .summaries
            .append_summary(summary, session.answered())
            .await?;
        session.set_summary_id(id);
        Ok(id)
    }

    /// Post `SessionEvent::Tick` to `events` once per second.
    pub fn spawn_ticker(
        &self,
        scheduler: &dyn TickScheduler,
        events: UnboundedSender<SessionEvent>,
    ) -> TickHandle {
        scheduler.schedule(
            TICK_INTERVAL,
            Box::new(move || {
                // The receiver is gone once the session owner shuts down.
                let _ = events.send(SessionEvent::Tick);
            }),
        )
    }

    async fn persist(&self, session: &mut SessionController) {
        if let Err(err) = self.finalize_summary(session).await {
            tracing::warn!(session = %session.id(), error = %err, "failed to persist session summary");
        }
    }
}
