use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::model::question::QuestionLevel;

pub const DEFAULT_QUESTION_COUNT: u32 = 20;

//
// ─── DIFFICULTY & MODE ────────────────────────────────────────────────────────
//

/// Requested difficulty for a session. `Mixed` admits every question level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Mixed => "mixed",
        }
    }

    /// The single question level this difficulty selects, or `None` for `Mixed`.
    #[must_use]
    pub fn level(self) -> Option<QuestionLevel> {
        match self {
            Self::Easy => Some(QuestionLevel::Easy),
            Self::Medium => Some(QuestionLevel::Medium),
            Self::Hard => Some(QuestionLevel::Hard),
            Self::Mixed => None,
        }
    }

    #[must_use]
    pub fn admits(self, level: QuestionLevel) -> bool {
        self.level().is_none_or(|wanted| wanted == level)
    }

    fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "medium" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Mixed,
        }
    }
}

/// Practice reveals explanations after each answer; exam withholds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Practice,
    Exam,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Exam => "exam",
        }
    }

    #[must_use]
    pub fn shows_explanations(self) -> bool {
        matches!(self, Self::Practice)
    }

    fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exam" => Self::Exam,
            _ => Self::Practice,
        }
    }
}

//
// ─── CONFIG ───────────────────────────────────────────────────────────────────
//

/// Immutable parameters of one session.
///
/// Resolution is permissive: malformed or unknown values fall back to
/// defaults instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    question_count: u32,
    difficulty: Difficulty,
    time_limit_minutes: Option<u32>,
    mode: SessionMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            difficulty: Difficulty::Mixed,
            time_limit_minutes: None,
            mode: SessionMode::Practice,
        }
    }
}

impl SessionConfig {
    /// Build a config directly. Zero values are normalized like parsed input:
    /// a zero count becomes the default, a zero time limit means unlimited.
    #[must_use]
    pub fn new(
        question_count: u32,
        difficulty: Difficulty,
        time_limit_minutes: Option<u32>,
        mode: SessionMode,
    ) -> Self {
        Self {
            question_count: if question_count == 0 {
                DEFAULT_QUESTION_COUNT
            } else {
                question_count
            },
            difficulty,
            time_limit_minutes: time_limit_minutes.filter(|m| *m > 0),
            mode,
        }
    }

    /// Resolve a config from flat key/value pairs.
    ///
    /// Recognized keys: `questions`, `difficulty`, `timeLimit`, `mode`.
    /// A repeated key takes its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "questions" => {
                    config.question_count = parse_positive(value).unwrap_or(DEFAULT_QUESTION_COUNT);
                }
                "difficulty" => config.difficulty = Difficulty::parse_lenient(value),
                "timeLimit" => config.time_limit_minutes = parse_positive(value),
                "mode" => config.mode = SessionMode::parse_lenient(value),
                _ => {}
            }
        }
        config
    }

    /// Resolve a config from a URL query string such as
    /// `questions=10&difficulty=hard&timeLimit=30&mode=exam`.
    ///
    /// A leading `?` is tolerated.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()))
    }

    /// Render the config as the query string a setup screen navigates with.
    #[must_use]
    pub fn to_query(&self) -> String {
        let time_limit = self
            .time_limit_minutes
            .map_or_else(|| "unlimited".to_owned(), |m| m.to_string());
        form_urlencoded::Serializer::new(String::new())
            .append_pair("questions", &self.question_count.to_string())
            .append_pair("difficulty", self.difficulty.as_str())
            .append_pair("timeLimit", &time_limit)
            .append_pair("mode", self.mode.as_str())
            .finish()
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_minutes.map(|m| m.saturating_mul(60))
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}
