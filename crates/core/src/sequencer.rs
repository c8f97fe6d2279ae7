//! Ordered, length-limited question list with a position cursor.

use thiserror::Error;

use crate::model::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    /// `advance` was called with no question left. Indicates a caller bug.
    #[error("question sequence exhausted at index {index} of {len}")]
    SequenceExhausted { index: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct QuestionSequencer {
    questions: Vec<Question>,
    current: usize,
}

impl QuestionSequencer {
    /// Keep at most `limit` questions, in the order supplied.
    ///
    /// A shorter pool just makes a shorter session.
    #[must_use]
    pub fn new(mut questions: Vec<Question>, limit: u32) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        questions.truncate(limit);
        Self {
            questions,
            current: 0,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current + 1 < self.questions.len()
    }

    /// Move the cursor to the next question.
    ///
    /// # Errors
    ///
    /// Returns `SequenceError::SequenceExhausted` when `has_next()` is false.
    pub fn advance(&mut self) -> Result<&Question, SequenceError> {
        if !self.has_next() {
            return Err(SequenceError::SequenceExhausted {
                index: self.current,
                len: self.questions.len(),
            });
        }
        self.current += 1;
        Ok(&self.questions[self.current])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}
