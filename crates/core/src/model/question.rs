use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, SubjectId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt is empty")]
    EmptyPrompt,

    #[error("duplicate option id within question: {0}")]
    DuplicateOption(OptionId),

    #[error("invalid question level: {0}")]
    InvalidLevel(String),
}

//
// ─── LEVEL ────────────────────────────────────────────────────────────────────
//

/// Difficulty tag carried by an individual question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuestionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Parses the stored lowercase label.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidLevel` for anything other than `easy`, `medium`, `hard`.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        match raw {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::InvalidLevel(other.to_owned())),
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A selectable answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A multiple-choice question as presented to the learner.
///
/// Read-only once built; the correct answer is never part of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    subject_id: SubjectId,
    prompt: String,
    options: Vec<AnswerOption>,
    level: QuestionLevel,
}

impl Question {
    /// Build a question, validating the prompt and option ids.
    ///
    /// A question without options is accepted; it simply cannot be answered.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyPrompt` for a blank prompt and
    /// `QuestionError::DuplicateOption` if two options share an id.
    pub fn new(
        id: QuestionId,
        subject_id: SubjectId,
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
        level: QuestionLevel,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(&option.id) {
                return Err(QuestionError::DuplicateOption(option.id.clone()));
            }
        }

        Ok(Self {
            id,
            subject_id,
            prompt,
            options,
            level,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn level(&self) -> QuestionLevel {
        self.level
    }

    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option)
    }

    #[must_use]
    pub fn is_answerable(&self) -> bool {
        !self.options.is_empty()
    }
}
