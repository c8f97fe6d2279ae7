use serde::{Deserialize, Serialize};

use crate::model::ids::{OptionId, QuestionId};

/// Step-by-step explanation attached to a graded answer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub bias_check: String,
    #[serde(default)]
    pub reflection: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Stored grading data for a question: the correct option and its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey {
    pub correct_answer: OptionId,
    pub explanation: Explanation,
}

impl AnswerKey {
    #[must_use]
    pub fn new(correct_answer: impl Into<OptionId>, explanation: Explanation) -> Self {
        Self {
            correct_answer: correct_answer.into(),
            explanation,
        }
    }

    /// Grade a selection by exact option id match.
    #[must_use]
    pub fn grade(&self, selected: &OptionId) -> AnswerResult {
        AnswerResult {
            correct: &self.correct_answer == selected,
            correct_answer: self.correct_answer.clone(),
            explanation: Some(self.explanation.clone()),
        }
    }
}

/// Outcome of a single submission, as returned by an evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_answer: OptionId,
    #[serde(default)]
    pub explanation: Option<Explanation>,
}

impl AnswerResult {
    /// Drop explanation content, as exam mode requires.
    #[must_use]
    pub fn without_explanation(mut self) -> Self {
        self.explanation = None;
        self
    }
}

/// One entry of the append-only answered log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredEntry {
    pub index: usize,
    pub question_id: QuestionId,
    pub selected: OptionId,
    pub correct: bool,
    pub time_spent_ms: u64,
}
