use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded;

use crate::model::answer::AnsweredEntry;
use crate::model::ids::{ExamId, SessionId, SubjectId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("too many answers for a single session: {len}")]
    TooManyAnswers { len: usize },

    #[error("score ({score}) exceeds answered count ({answered})")]
    ScoreExceedsAnswered { score: u32, answered: u32 },

    #[error("answered count ({answered}) exceeds total questions ({total})")]
    AnsweredExceedsTotal { answered: u32, total: u32 },

    #[error("invalid completion reason: {0}")]
    InvalidReason(String),
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every question was answered and the learner advanced past the last one.
    Finished,
    /// The countdown reached zero.
    TimedOut,
    /// The learner confirmed an explicit stop.
    Stopped,
}

impl CompletionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::TimedOut => "timed_out",
            Self::Stopped => "stopped",
        }
    }

    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidReason` for unknown labels.
    pub fn parse(raw: &str) -> Result<Self, SessionSummaryError> {
        match raw {
            "finished" => Ok(Self::Finished),
            "timed_out" => Ok(Self::TimedOut),
            "stopped" => Ok(Self::Stopped),
            other => Err(SessionSummaryError::InvalidReason(other.to_owned())),
        }
    }

    #[must_use]
    pub fn is_forced(self) -> bool {
        !matches!(self, Self::Finished)
    }
}

/// Final result of a completed session, handed to the results display.
///
/// Unanswered questions count as incorrect: `incorrect() == total - score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    session_id: SessionId,
    exam_id: ExamId,
    subject_id: SubjectId,
    score: u32,
    total: u32,
    answered: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    reason: CompletionReason,
}

impl SessionSummary {
    /// Rehydrate a summary from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError` if the time range or counts are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        exam_id: ExamId,
        subject_id: SubjectId,
        score: u32,
        total: u32,
        answered: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: CompletionReason,
    ) -> Result<Self, SessionSummaryError> {
        if completed_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        if score > answered {
            return Err(SessionSummaryError::ScoreExceedsAnswered { score, answered });
        }
        if answered > total {
            return Err(SessionSummaryError::AnsweredExceedsTotal { answered, total });
        }

        Ok(Self {
            session_id,
            exam_id,
            subject_id,
            score,
            total,
            answered,
            started_at,
            completed_at,
            reason,
        })
    }

    /// Build a summary from the answered log of a session.
    ///
    /// The score is recounted from confirmed-correct entries only.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError` if the log does not fit the session shape.
    #[allow(clippy::too_many_arguments)]
    pub fn from_log(
        session_id: SessionId,
        exam_id: ExamId,
        subject_id: SubjectId,
        total: usize,
        log: &[AnsweredEntry],
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: CompletionReason,
    ) -> Result<Self, SessionSummaryError> {
        let answered = u32::try_from(log.len())
            .map_err(|_| SessionSummaryError::TooManyAnswers { len: log.len() })?;
        let total =
            u32::try_from(total).map_err(|_| SessionSummaryError::TooManyAnswers { len: total })?;
        let score = log
            .iter()
            .filter(|entry| entry.correct)
            .fold(0_u32, |acc, _| acc.saturating_add(1));

        Self::from_persisted(
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
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
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
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.total - self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.completed_at - self.started_at
    }

    #[must_use]
    pub fn reason(&self) -> CompletionReason {
        self.reason
    }

    #[must_use]
    pub fn timed_out(&self) -> bool {
        matches!(self.reason, CompletionReason::TimedOut)
    }

    /// Rounded percentage of correct answers over all questions.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pct = (u64::from(self.score) * 100 + u64::from(self.total) / 2) / u64::from(self.total);
        u32::try_from(pct).unwrap_or(100)
    }

    /// Parameters consumed by the results page:
    /// `score`, `total`, `correct`, `time` (`m:ss`) and `timedOut`.
    #[must_use]
    pub fn to_results_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("score", &self.score.to_string())
            .append_pair("total", &self.total.to_string())
            .append_pair("correct", &self.score.to_string())
            .append_pair("time", &format_elapsed(self.elapsed()))
            .append_pair("timedOut", if self.timed_out() { "true" } else { "false" })
            .finish()
    }
}

/// Formats a duration as `m:ss`; negative durations render as `0:00`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{OptionId, QuestionId};
    use crate::time::fixed_now;

    fn entry(index: usize, correct: bool) -> AnsweredEntry {
        AnsweredEntry {
            index,
            question_id: QuestionId::new(format!("q{index}")),
            selected: OptionId::new("a"),
            correct,
            time_spent_ms: 1_000,
        }
    }

    fn summary(log: &[AnsweredEntry], total: usize, reason: CompletionReason) -> SessionSummary {
        let now = fixed_now();
        SessionSummary::from_log(
            SessionId::generate(),
            ExamId::new("enem"),
            SubjectId::new("math"),
            total,
            log,
            now,
            now + Duration::seconds(125),
            reason,
        )
        .unwrap()
    }

    #[test]
    fn summary_counts_only_correct_entries() {
        let log = vec![entry(0, true), entry(1, false), entry(2, true)];
        let s = summary(&log, 10, CompletionReason::Stopped);
        assert_eq!(s.score(), 2);
        assert_eq!(s.answered(), 3);
        assert_eq!(s.total(), 10);
        assert_eq!(s.incorrect(), 8);
        assert_eq!(s.accuracy_percent(), 20);
        assert!(!s.timed_out());
        assert!(s.reason().is_forced());
    }

    #[test]
    fn results_query_carries_time_and_flag() {
        let s = summary(&[], 5, CompletionReason::TimedOut);
        assert_eq!(
            s.to_results_query(),
            "score=0&total=5&correct=0&time=2%3A05&timedOut=true"
        );
    }

    #[test]
    fn persisted_summary_rejects_inconsistent_counts() {
        let now = fixed_now();
        let err = SessionSummary::from_persisted(
            SessionId::generate(),
            ExamId::new("e"),
            SubjectId::new("s"),
            3,
            5,
            2,
            now,
            now,
            CompletionReason::Finished,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SessionSummaryError::ScoreExceedsAnswered {
                score: 3,
                answered: 2
            }
        );

        let err = SessionSummary::from_persisted(
            SessionId::generate(),
            ExamId::new("e"),
            SubjectId::new("s"),
            0,
            5,
            0,
            now,
            now - Duration::seconds(1),
            CompletionReason::Finished,
        )
        .unwrap_err();
        assert_eq!(err, SessionSummaryError::InvalidTimeRange);
    }

    #[test]
    fn elapsed_formats_as_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::seconds(0)), "0:00");
        assert_eq!(format_elapsed(Duration::seconds(61)), "1:01");
        assert_eq!(format_elapsed(Duration::seconds(-5)), "0:00");
    }

    #[test]
    fn reason_labels_round_trip() {
        for reason in [
            CompletionReason::Finished,
            CompletionReason::TimedOut,
            CompletionReason::Stopped,
        ] {
            assert_eq!(CompletionReason::parse(reason.as_str()).unwrap(), reason);
        }
    }
}
