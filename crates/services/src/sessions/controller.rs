use std::fmt;

use chrono::{DateTime, Utc};
use prep_core::model::{
    AnswerResult, AnsweredEntry, CompletionReason, ExamId, Explanation, OptionId, Question,
    QuestionId, SessionConfig, SessionId, SessionSummary, SubjectId,
};
use prep_core::sequencer::QuestionSequencer;
use prep_core::time::millis_between;
use prep_core::timer::{CountdownTimer, TimerState, TimerTick};

use super::progress::SessionProgress;
use crate::error::{EvaluationError, SessionError};
use crate::evaluator::AnswerEvaluator;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

/// Phase a paused session returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeTo {
    Selecting,
    /// Paused with an answer still out for evaluation.
    Submitting,
    Reviewing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the learner to pick and submit an option.
    Selecting,
    /// An answer is out for evaluation.
    Submitting,
    /// Result shown; waiting for the learner to advance.
    Reviewing,
    Paused { resume_to: ResumeTo },
    Completed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Selecting => "selecting",
            Self::Submitting => "submitting",
            Self::Reviewing => "reviewing",
            Self::Paused { .. } => "paused",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl From<ResumeTo> for SessionPhase {
    fn from(value: ResumeTo) -> Self {
        match value {
            ResumeTo::Selecting => Self::Selecting,
            ResumeTo::Submitting => Self::Submitting,
            ResumeTo::Reviewing => Self::Reviewing,
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// An answer handed to the evaluator. Returned by `begin_submit`, consumed by `finish_submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub index: usize,
    pub question_id: QuestionId,
    pub selected: OptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Next,
    Completed(SessionSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown is running (untimed or already finished).
    Inactive,
    /// Paused or reviewing; the tick was not counted.
    Skipped,
    Counted { remaining: u32 },
    Expired(SessionSummary),
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// State machine for a single timed practice session.
///
/// All mutation goes through `&mut self`, so a tick can never interleave with a
/// transition. Callers pass `now` from the services clock.
#[derive(Debug)]
pub struct SessionController {
    id: SessionId,
    exam_id: ExamId,
    subject_id: SubjectId,
    config: SessionConfig,
    sequencer: QuestionSequencer,
    timer: CountdownTimer,
    phase: SessionPhase,
    selected: Option<OptionId>,
    score: u32,
    answered: Vec<AnsweredEntry>,
    last_result: Option<AnswerResult>,
    stop_requested: bool,
    started_at: DateTime<Utc>,
    presented_at: DateTime<Utc>,
    pending: Option<SubmitRequest>,
    summary: Option<SessionSummary>,
    summary_id: Option<i64>,
}

impl SessionController {
    /// Build a session over `questions`, truncated to the configured count, and
    /// start its countdown when a time limit is set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        id: SessionId,
        exam_id: ExamId,
        subject_id: SubjectId,
        config: SessionConfig,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let sequencer = QuestionSequencer::new(questions, config.question_count());
        if sequencer.is_empty() {
            return Err(SessionError::Empty);
        }

        let mut timer = CountdownTimer::new(config.time_limit_secs());
        timer.start();

        tracing::debug!(
            session = %id,
            questions = sequencer.len(),
            time_limit_secs = ?config.time_limit_secs(),
            mode = config.mode().as_str(),
            "session started"
        );

        Ok(Self {
            id,
            exam_id,
            subject_id,
            config,
            sequencer,
            timer,
            phase: SessionPhase::Selecting,
            selected: None,
            score: 0,
            answered: Vec::new(),
            last_result: None,
            stop_requested: false,
            started_at: now,
            presented_at: now,
            pending: None,
            summary: None,
            summary_id: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn exam_id(&self) -> &ExamId {
        &self.exam_id
    }

    #[must_use]
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self.phase, SessionPhase::Paused { .. })
    }

    /// True while a result is shown and the learner has not advanced.
    #[must_use]
    pub fn awaiting_next(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Reviewing
                | SessionPhase::Paused {
                    resume_to: ResumeTo::Reviewing
                }
        )
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.is_complete() {
            return None;
        }
        self.sequencer.current()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.sequencer.current_index()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.sequencer.len()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&OptionId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answered(&self) -> &[AnsweredEntry] {
        &self.answered
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&AnswerResult> {
        self.last_result.as_ref()
    }

    /// Explanation of the last result. Always `None` in exam mode.
    #[must_use]
    pub fn explanation(&self) -> Option<&Explanation> {
        if !self.config.mode().shows_explanations() {
            return None;
        }
        self.last_result.as_ref()?.explanation.as_ref()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.timer.remaining_secs()
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<i64> {
        self.summary_id
    }

    pub fn set_summary_id(&mut self, id: i64) {
        self.summary_id = Some(id);
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::new(
            self.sequencer.current_index(),
            self.sequencer.len(),
            self.answered.len(),
            self.score,
            self.timer.remaining_secs(),
        )
    }

    /// Choose an option of the current question. Replaces any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownOption` if the option is not on the current
    /// question, or `InvalidTransition` outside the selecting phase.
    pub fn select(&mut self, option: OptionId) -> Result<(), SessionError> {
        self.ensure_phase("select", SessionPhase::Selecting)?;
        let question = self.sequencer.current().ok_or(SessionError::Completed)?;
        if !question.has_option(&option) {
            return Err(SessionError::UnknownOption(option));
        }
        tracing::debug!(session = %self.id, option = %option, "option selected");
        self.selected = Some(option);
        Ok(())
    }

    /// `selecting -> submitting`. The caller hands the request to an evaluator
    /// and reports back through `finish_submit`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` when nothing is selected, or
    /// `InvalidTransition` outside the selecting phase.
    pub fn begin_submit(&mut self, now: DateTime<Utc>) -> Result<SubmitRequest, SessionError> {
        self.ensure_phase("submit", SessionPhase::Selecting)?;
        let selected = self.selected.clone().ok_or(SessionError::NoSelection)?;
        let question = self.sequencer.current().ok_or(SessionError::Completed)?;

        let request = SubmitRequest {
            index: self.sequencer.current_index(),
            question_id: question.id().clone(),
            selected,
        };
        tracing::debug!(
            session = %self.id,
            index = request.index,
            question = %request.question_id,
            elapsed_ms = millis_between(self.presented_at, now),
            "answer submitted"
        );

        self.stop_requested = false;
        self.pending = Some(request.clone());
        self.phase = SessionPhase::Submitting;
        Ok(request)
    }

    /// Apply the evaluator's response to a pending submission.
    ///
    /// On success: `submitting -> reviewing`, the answer is logged and the score
    /// updated. On failure: back to `selecting` with the selection kept and the
    /// log untouched. A session paused mid-evaluation stays paused and resumes
    /// into the phase the response leads to.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when the session ended while the answer
    /// was out (the response is discarded), `StaleSubmission` when `request`
    /// is not the pending one, or `EvaluationFailed` carrying the evaluator error.
    pub fn finish_submit(
        &mut self,
        request: &SubmitRequest,
        outcome: Result<AnswerResult, EvaluationError>,
        now: DateTime<Utc>,
    ) -> Result<&AnswerResult, SessionError> {
        if self.is_complete() {
            tracing::debug!(session = %self.id, "late evaluation discarded");
            return Err(SessionError::Completed);
        }
        let paused = match self.phase {
            SessionPhase::Submitting => false,
            SessionPhase::Paused {
                resume_to: ResumeTo::Submitting,
            } => true,
            _ => return Err(SessionError::StaleSubmission),
        };
        if self.pending.as_ref() != Some(request) {
            return Err(SessionError::StaleSubmission);
        }
        self.pending = None;

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    session = %self.id,
                    question = %request.question_id,
                    error = %err,
                    "answer evaluation failed"
                );
                self.settle(ResumeTo::Selecting, paused);
                return Err(SessionError::EvaluationFailed(err));
            }
        };

        let result = if self.config.mode().shows_explanations() {
            result
        } else {
            result.without_explanation()
        };

        if result.correct {
            self.score = self.score.saturating_add(1);
        }
        self.answered.push(AnsweredEntry {
            index: request.index,
            question_id: request.question_id.clone(),
            selected: request.selected.clone(),
            correct: result.correct,
            time_spent_ms: millis_between(self.presented_at, now),
        });
        tracing::debug!(
            session = %self.id,
            index = request.index,
            correct = result.correct,
            score = self.score,
            "answer evaluated"
        );

        self.settle(ResumeTo::Reviewing, paused);
        Ok(&*self.last_result.insert(result))
    }

    fn settle(&mut self, next: ResumeTo, paused: bool) {
        self.phase = if paused {
            SessionPhase::Paused { resume_to: next }
        } else {
            next.into()
        };
    }

    /// Submit the current selection and wait for the evaluator.
    ///
    /// # Errors
    ///
    /// See `begin_submit` and `finish_submit`.
    pub async fn submit(
        &mut self,
        evaluator: &dyn AnswerEvaluator,
        now: DateTime<Utc>,
    ) -> Result<&AnswerResult, SessionError> {
        let request = self.begin_submit(now)?;
        let outcome = evaluator
            .submit(&request.question_id, &request.selected)
            .await;
        self.finish_submit(&request, outcome, now)
    }

    /// `reviewing -> selecting` on the next question, or `reviewing -> completed`
    /// after the last one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside the reviewing phase.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<AdvanceOutcome, SessionError> {
        self.ensure_phase("advance", SessionPhase::Reviewing)?;

        if !self.sequencer.has_next() {
            let summary = self.complete(CompletionReason::Finished, now)?;
            return Ok(AdvanceOutcome::Completed(summary));
        }

        self.sequencer.advance()?;
        self.selected = None;
        self.last_result = None;
        self.presented_at = now;
        self.phase = SessionPhase::Selecting;
        tracing::debug!(
            session = %self.id,
            index = self.sequencer.current_index(),
            "advanced to next question"
        );
        Ok(AdvanceOutcome::Next)
    }

    /// Freeze the session. Returns `false` if it was already paused.
    ///
    /// Pausing while an answer is out for evaluation freezes the clock too; the
    /// response is still applied through `finish_submit`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after completion.
    pub fn pause(&mut self) -> Result<bool, SessionError> {
        let resume_to = match self.phase {
            SessionPhase::Selecting => ResumeTo::Selecting,
            SessionPhase::Submitting => ResumeTo::Submitting,
            SessionPhase::Reviewing => ResumeTo::Reviewing,
            SessionPhase::Paused { .. } => return Ok(false),
            SessionPhase::Completed => return Err(SessionError::Completed),
        };
        self.timer.pause();
        self.phase = SessionPhase::Paused { resume_to };
        tracing::debug!(session = %self.id, remaining = ?self.timer.remaining_secs(), "paused");
        Ok(true)
    }

    /// Return to the phase held before pausing. Returns `false` if not paused.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after completion.
    pub fn resume(&mut self) -> Result<bool, SessionError> {
        let resume_to = match self.phase {
            SessionPhase::Paused { resume_to } => resume_to,
            SessionPhase::Completed => return Err(SessionError::Completed),
            _ => return Ok(false),
        };
        self.timer.resume();
        self.phase = resume_to.into();
        tracing::debug!(session = %self.id, remaining = ?self.timer.remaining_secs(), "resumed");
        Ok(true)
    }

    /// One second of wall-clock time.
    ///
    /// Counted while selecting or submitting; skipped while paused or reviewing.
    /// Reaching zero forces completion with `TimedOut`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Summary` if the summary cannot be built.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, SessionError> {
        match self.phase {
            SessionPhase::Completed => return Ok(TickOutcome::Inactive),
            SessionPhase::Paused { .. } | SessionPhase::Reviewing => {
                if self.timer.remaining_secs().is_none() {
                    return Ok(TickOutcome::Inactive);
                }
                return Ok(TickOutcome::Skipped);
            }
            SessionPhase::Selecting | SessionPhase::Submitting => {}
        }

        match self.timer.tick() {
            TimerTick::Inactive => Ok(TickOutcome::Inactive),
            TimerTick::Remaining(remaining) => Ok(TickOutcome::Counted { remaining }),
            TimerTick::Expired => {
                let summary = self.complete(CompletionReason::TimedOut, now)?;
                Ok(TickOutcome::Expired(summary))
            }
        }
    }

    /// Arm the stop confirmation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` while an answer is being evaluated.
    pub fn request_stop(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Completed => Err(SessionError::Completed),
            phase @ (SessionPhase::Submitting
            | SessionPhase::Paused {
                resume_to: ResumeTo::Submitting,
            }) => Err(SessionError::InvalidTransition {
                action: "stop",
                phase,
            }),
            _ => {
                self.stop_requested = true;
                Ok(())
            }
        }
    }

    pub fn cancel_stop(&mut self) {
        self.stop_requested = false;
    }

    /// Complete the session with reason `Stopped`. The question on screen is not
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StopNotRequested` unless `request_stop` was called
    /// first.
    pub fn confirm_stop(&mut self, now: DateTime<Utc>) -> Result<SessionSummary, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        if !self.stop_requested {
            return Err(SessionError::StopNotRequested);
        }
        self.complete(CompletionReason::Stopped, now)
    }

    fn complete(
        &mut self,
        reason: CompletionReason,
        now: DateTime<Utc>,
    ) -> Result<SessionSummary, SessionError> {
        let summary = SessionSummary::from_log(
            self.id,
            self.exam_id.clone(),
            self.subject_id.clone(),
            self.sequencer.len(),
            &self.answered,
            self.started_at,
            now.max(self.started_at),
            reason,
        )?;

        self.timer.pause();
        self.phase = SessionPhase::Completed;
        self.stop_requested = false;
        self.pending = None;
        self.summary = Some(summary.clone());

        tracing::info!(
            session = %self.id,
            reason = reason.as_str(),
            score = summary.score(),
            total = summary.total(),
            answered = summary.answered(),
            "session completed"
        );
        Ok(summary)
    }

    fn ensure_phase(
        &self,
        action: &'static str,
        expected: SessionPhase,
    ) -> Result<(), SessionError> {
        if self.phase == expected {
            return Ok(());
        }
        if self.phase == SessionPhase::Completed {
            return Err(SessionError::Completed);
        }
        Err(SessionError::InvalidTransition {
            action,
            phase: self.phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{AnswerOption, Difficulty, QuestionLevel, SessionMode};
    use prep_core::time::fixed_now;

    fn build_question(n: usize) -> Question {
        Question::new(
            QuestionId::new(format!("q{n}")),
            SubjectId::new("math"),
            format!("Question {n}"),
            vec![AnswerOption::new("a", "first"), AnswerOption::new("b", "second")],
            QuestionLevel::Medium,
        )
        .unwrap()
    }

    fn build_session(pool: usize, config: SessionConfig) -> SessionController {
        SessionController::new(
            SessionId::generate(),
            ExamId::new("enem"),
            SubjectId::new("math"),
            config,
            (0..pool).map(build_question).collect(),
            fixed_now(),
        )
        .unwrap()
    }

    fn graded(correct: bool) -> Result<AnswerResult, EvaluationError> {
        Ok(AnswerResult {
            correct,
            correct_answer: OptionId::new("a"),
            explanation: Some(Explanation {
                concept: "Ratios".into(),
                ..Explanation::default()
            }),
        })
    }

    fn answer(session: &mut SessionController, correct: bool) {
        session.select(OptionId::new("a")).unwrap();
        let request = session.begin_submit(fixed_now()).unwrap();
        session
            .finish_submit(&request, graded(correct), fixed_now())
            .unwrap();
    }

    fn check_score_invariant(session: &SessionController) {
        assert!(session.score() as usize <= session.answered().len());
        assert!(session.answered().len() <= session.current_index() + 1);
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = SessionController::new(
            SessionId::generate(),
            ExamId::new("enem"),
            SubjectId::new("math"),
            SessionConfig::default(),
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Empty));
    }

    #[test]
    fn five_of_twenty_answers_exactly_five() {
        let config = SessionConfig::new(5, Difficulty::Mixed, None, SessionMode::Practice);
        let mut session = build_session(20, config);
        assert_eq!(session.total(), 5);

        let mut outcome = AdvanceOutcome::Next;
        for i in 0..5 {
            answer(&mut session, i % 2 == 0);
            check_score_invariant(&session);
            outcome = session.advance(fixed_now()).unwrap();
        }

        let AdvanceOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(session.answered().len(), 5);
        assert_eq!(summary.score(), 3);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.reason(), CompletionReason::Finished);
        assert!(session.is_complete());
    }

    #[test]
    fn untimed_session_never_starts_timer() {
        let mut session = build_session(3, SessionConfig::default());
        assert_eq!(session.timer_state(), TimerState::Stopped);
        for _ in 0..120 {
            assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Inactive);
        }
        answer(&mut session, true);
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Inactive);
        assert_eq!(session.timer_state(), TimerState::Stopped);
        assert_eq!(session.remaining_seconds(), None);
    }

    #[test]
    fn one_minute_limit_times_out_after_sixty_ticks() {
        let config = SessionConfig::new(10, Difficulty::Mixed, Some(1), SessionMode::Practice);
        let mut session = build_session(20, config);

        let mut last = TickOutcome::Inactive;
        for i in 1..=60 {
            last = session.tick(fixed_now() + Duration::seconds(i)).unwrap();
        }

        let TickOutcome::Expired(summary) = last else {
            panic!("expected expiry, got {last:?}");
        };
        assert_eq!(summary.score(), 0);
        assert_eq!(summary.total(), 10);
        assert!(summary.timed_out());
        assert_eq!(summary.elapsed(), Duration::seconds(60));
        assert!(session.is_complete());
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Inactive);
    }

    #[test]
    fn pause_freezes_remaining_time() {
        let config = SessionConfig::new(10, Difficulty::Mixed, Some(5), SessionMode::Practice);
        let mut session = build_session(10, config);
        for _ in 0..50 {
            session.tick(fixed_now()).unwrap();
        }
        assert_eq!(session.remaining_seconds(), Some(250));

        assert!(session.pause().unwrap());
        for _ in 0..30 {
            assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Skipped);
        }
        assert!(session.resume().unwrap());
        assert_eq!(session.remaining_seconds(), Some(250));
        assert_eq!(session.phase(), SessionPhase::Selecting);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(2), SessionMode::Practice);
        let mut session = build_session(3, config);
        assert!(!session.resume().unwrap());
        assert!(session.pause().unwrap());
        assert!(!session.pause().unwrap());
        assert!(session.is_paused());
        assert!(session.resume().unwrap());
        assert!(!session.resume().unwrap());
        assert_eq!(session.timer_state(), TimerState::Running);
    }

    #[test]
    fn reviewing_skips_ticks_and_resume_returns_there() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(1), SessionMode::Practice);
        let mut session = build_session(3, config);
        answer(&mut session, true);
        assert!(session.awaiting_next());
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Skipped);
        assert_eq!(session.remaining_seconds(), Some(60));

        session.pause().unwrap();
        assert!(session.awaiting_next());
        session.resume().unwrap();
        assert_eq!(session.phase(), SessionPhase::Reviewing);
    }

    #[test]
    fn ticks_count_while_submitting() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(1), SessionMode::Practice);
        let mut session = build_session(3, config);
        session.select(OptionId::new("b")).unwrap();
        session.begin_submit(fixed_now()).unwrap();
        assert_eq!(
            session.tick(fixed_now()).unwrap(),
            TickOutcome::Counted { remaining: 59 }
        );
    }

    #[test]
    fn pause_during_evaluation_freezes_clock_until_resume() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(5), SessionMode::Practice);
        let mut session = build_session(3, config);
        session.select(OptionId::new("a")).unwrap();
        let request = session.begin_submit(fixed_now()).unwrap();

        assert!(session.pause().unwrap());
        assert_eq!(
            session.phase(),
            SessionPhase::Paused {
                resume_to: ResumeTo::Submitting
            }
        );
        for _ in 0..10 {
            assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Skipped);
        }
        assert_eq!(session.remaining_seconds(), Some(300));
        assert!(matches!(
            session.request_stop(),
            Err(SessionError::InvalidTransition { action: "stop", .. })
        ));

        session
            .finish_submit(&request, graded(true), fixed_now())
            .unwrap();
        assert_eq!(
            session.phase(),
            SessionPhase::Paused {
                resume_to: ResumeTo::Reviewing
            }
        );
        assert!(session.awaiting_next());
        assert_eq!(session.answered().len(), 1);
        assert_eq!(session.score(), 1);
        assert_eq!(session.timer_state(), TimerState::Paused);
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Skipped);

        assert!(session.resume().unwrap());
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert_eq!(session.remaining_seconds(), Some(300));
    }

    #[test]
    fn failed_evaluation_while_paused_stays_paused_for_retry() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(5), SessionMode::Practice);
        let mut session = build_session(3, config);
        session.select(OptionId::new("b")).unwrap();
        let request = session.begin_submit(fixed_now()).unwrap();
        session.tick(fixed_now()).unwrap();
        session.pause().unwrap();

        let err = session
            .finish_submit(
                &request,
                Err(EvaluationError::UnknownQuestion(request.question_id.clone())),
                fixed_now(),
            )
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            session.phase(),
            SessionPhase::Paused {
                resume_to: ResumeTo::Selecting
            }
        );
        assert_eq!(session.selected(), Some(&OptionId::new("b")));
        assert!(session.answered().is_empty());
        assert_eq!(session.tick(fixed_now()).unwrap(), TickOutcome::Skipped);
        assert_eq!(session.remaining_seconds(), Some(299));

        assert!(session.resume().unwrap());
        assert_eq!(session.phase(), SessionPhase::Selecting);
        assert_eq!(session.begin_submit(fixed_now()).unwrap(), request);
    }

    #[test]
    fn evaluation_failure_keeps_selection_and_log() {
        let mut session = build_session(3, SessionConfig::default());
        session.select(OptionId::new("b")).unwrap();
        let request = session.begin_submit(fixed_now()).unwrap();

        let err = session
            .finish_submit(
                &request,
                Err(EvaluationError::UnknownQuestion(request.question_id.clone())),
                fixed_now(),
            )
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.phase(), SessionPhase::Selecting);
        assert_eq!(session.selected(), Some(&OptionId::new("b")));
        assert!(session.answered().is_empty());
        assert_eq!(session.score(), 0);

        let retry = session.begin_submit(fixed_now()).unwrap();
        assert_eq!(retry, request);
    }

    #[test]
    fn forced_stop_counts_only_confirmed_answers() {
        let mut session = build_session(10, SessionConfig::default());
        answer(&mut session, true);
        session.advance(fixed_now()).unwrap();
        answer(&mut session, false);
        session.advance(fixed_now()).unwrap();
        answer(&mut session, true);
        session.advance(fixed_now()).unwrap();
        assert_eq!(session.current_index(), 3);
        session.select(OptionId::new("a")).unwrap();

        assert!(matches!(
            session.confirm_stop(fixed_now()),
            Err(SessionError::StopNotRequested)
        ));
        session.request_stop().unwrap();
        let summary = session.confirm_stop(fixed_now()).unwrap();

        assert_eq!(summary.score(), 2);
        assert_eq!(summary.total(), 10);
        assert_eq!(summary.incorrect(), 8);
        assert_eq!(summary.reason(), CompletionReason::Stopped);
        assert_eq!(session.answered().len(), 3);
        check_score_invariant(&session);
    }

    #[test]
    fn stop_on_third_question_keeps_two_logged_answers() {
        let mut session = build_session(10, SessionConfig::default());
        for _ in 0..2 {
            answer(&mut session, true);
            session.advance(fixed_now()).unwrap();
        }
        assert_eq!(session.progress().position, 3);
        session.select(OptionId::new("a")).unwrap();

        session.request_stop().unwrap();
        let summary = session.confirm_stop(fixed_now()).unwrap();

        assert_eq!(summary.score(), 2);
        assert_eq!(summary.total(), 10);
        assert_eq!(summary.answered(), 2);
        assert_eq!(session.answered().len(), 2);
        assert!(session.answered().iter().all(|entry| entry.correct));
    }

    #[test]
    fn cancelled_stop_must_be_requested_again() {
        let mut session = build_session(2, SessionConfig::default());
        session.request_stop().unwrap();
        session.cancel_stop();
        assert!(!session.stop_requested());
        assert!(matches!(
            session.confirm_stop(fixed_now()),
            Err(SessionError::StopNotRequested)
        ));
        assert!(!session.is_complete());
    }

    #[test]
    fn exam_mode_hides_explanations() {
        let config = SessionConfig::new(2, Difficulty::Mixed, None, SessionMode::Exam);
        let mut exam = build_session(2, config);
        answer(&mut exam, false);
        assert!(exam.explanation().is_none());
        assert!(exam.last_result().is_some());
        assert_eq!(exam.phase(), SessionPhase::Reviewing);

        let mut practice = build_session(2, SessionConfig::default());
        answer(&mut practice, false);
        assert_eq!(practice.explanation().unwrap().concept, "Ratios");
    }

    #[test]
    fn response_after_timeout_is_discarded() {
        let config = SessionConfig::new(3, Difficulty::Mixed, Some(1), SessionMode::Practice);
        let mut session = build_session(3, config);
        session.select(OptionId::new("a")).unwrap();
        let request = session.begin_submit(fixed_now()).unwrap();
        for _ in 0..60 {
            session.tick(fixed_now()).unwrap();
        }
        assert!(session.is_complete());

        let late = session.finish_submit(&request, graded(true), fixed_now());
        assert!(matches!(late, Err(SessionError::Completed)));
        assert_eq!(session.score(), 0);
        assert_eq!(session.summary().unwrap().score(), 0);
    }

    #[test]
    fn unknown_option_and_missing_selection_are_rejected() {
        let mut session = build_session(2, SessionConfig::default());
        assert!(matches!(
            session.begin_submit(fixed_now()),
            Err(SessionError::NoSelection)
        ));
        assert!(matches!(
            session.select(OptionId::new("z")),
            Err(SessionError::UnknownOption(_))
        ));
        assert!(session.selected().is_none());
    }

    #[test]
    fn advance_clears_selection_and_rejects_out_of_phase() {
        let mut session = build_session(2, SessionConfig::default());
        assert!(matches!(
            session.advance(fixed_now()),
            Err(SessionError::InvalidTransition { action: "advance", .. })
        ));
        answer(&mut session, true);
        assert!(matches!(
            session.select(OptionId::new("b")),
            Err(SessionError::InvalidTransition { .. })
        ));
        assert_eq!(session.advance(fixed_now()).unwrap(), AdvanceOutcome::Next);
        assert!(session.selected().is_none());
        assert!(session.last_result().is_none());
        assert_eq!(session.progress().position, 2);
    }

    #[tokio::test]
    async fn submit_runs_the_evaluator() {
        struct AlwaysRight;

        #[async_trait::async_trait]
        impl AnswerEvaluator for AlwaysRight {
            async fn submit(
                &self,
                _question_id: &QuestionId,
                selected: &OptionId,
            ) -> Result<AnswerResult, EvaluationError> {
                Ok(AnswerResult {
                    correct: true,
                    correct_answer: selected.clone(),
                    explanation: None,
                })
            }
        }

        let mut session = build_session(1, SessionConfig::default());
        session.select(OptionId::new("b")).unwrap();
        let result = session.submit(&AlwaysRight, fixed_now()).await.unwrap();
        assert!(result.correct);
        assert_eq!(session.progress().score, 1);
        assert_eq!(session.progress().answered, 1);
    }
}
