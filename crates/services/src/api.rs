use std::env;

use async_trait::async_trait;
use prep_core::model::{
    AnswerOption, AnswerResult, Difficulty, ExamId, Explanation, OptionId, Question, QuestionId,
    QuestionLevel, SubjectId,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, EvaluationError, SessionError};
use crate::evaluator::AnswerEvaluator;
use crate::sessions::QuestionSource;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Settings from `PREP_API_URL` and `PREP_API_TOKEN`, with `base_url`
    /// taking precedence over the URL variable. `None` when no URL is given.
    #[must_use]
    pub fn from_env(base_url: Option<String>) -> Option<Self> {
        Self::resolve(
            base_url.or_else(|| env::var("PREP_API_URL").ok()),
            env::var("PREP_API_TOKEN").ok(),
        )
    }

    fn resolve(base_url: Option<String>, token: Option<String>) -> Option<Self> {
        base_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| Self::new(url).with_token(token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client for the remote exam API: question retrieval and answer grading.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch the questions of an exam subject.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails, the status is not a success,
    /// or a returned question is malformed.
    pub async fn get_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
    ) -> Result<Vec<Question>, ApiError> {
        let url = self
            .config
            .url(&format!("/exams/{exam_id}/subjects/{subject_id}/questions"));
        tracing::debug!(%url, "fetching questions");

        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }

        let body: Vec<WireQuestion> = response.json().await?;
        body.into_iter()
            .map(WireQuestion::into_question)
            .collect()
    }

    /// Submit an answer for grading.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails or the status is not a success.
    pub async fn submit_answer(
        &self,
        question_id: &QuestionId,
        selected: &OptionId,
    ) -> Result<AnswerResult, ApiError> {
        let url = self.config.url(&format!("/questions/{question_id}/answer"));
        let payload = AnswerSubmission {
            answer: selected.as_str(),
        };

        let response = self
            .authorize(self.client.post(url))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status()));
        }

        let body: WireAnswer = response.json().await?;
        Ok(body.into_result())
    }
}

#[async_trait]
impl AnswerEvaluator for ApiClient {
    async fn submit(
        &self,
        question_id: &QuestionId,
        selected: &OptionId,
    ) -> Result<AnswerResult, EvaluationError> {
        Ok(self.submit_answer(question_id, selected).await?)
    }
}

/// The remote API carries no difficulty, so the filter is not applied here.
#[async_trait]
impl QuestionSource for ApiClient {
    async fn load_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        _difficulty: Difficulty,
    ) -> Result<Vec<Question>, SessionError> {
        Ok(self.get_questions(exam_id, subject_id).await?)
    }
}

#[derive(Debug, Serialize)]
struct AnswerSubmission<'a> {
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireOption {
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    id: String,
    subject_id: String,
    question: String,
    #[serde(default)]
    options: Vec<WireOption>,
    #[serde(default)]
    difficulty: Option<String>,
}

impl WireQuestion {
    fn into_question(self) -> Result<Question, ApiError> {
        let level = self
            .difficulty
            .as_deref()
            .and_then(|d| QuestionLevel::parse(d).ok())
            .unwrap_or_default();
        let options = self
            .options
            .into_iter()
            .map(|o| AnswerOption::new(OptionId::new(o.id), o.text))
            .collect();
        Ok(Question::new(
            QuestionId::new(self.id),
            SubjectId::new(self.subject_id),
            self.question,
            options,
            level,
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct WireAnswer {
    correct: bool,
    correct_answer: String,
    #[serde(default)]
    explanation: Option<Explanation>,
}

impl WireAnswer {
    fn into_result(self) -> AnswerResult {
        AnswerResult {
            correct: self.correct,
            correct_answer: OptionId::new(self.correct_answer),
            explanation: self.explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_a_url_and_drops_blank_tokens() {
        assert!(ApiConfig::resolve(None, Some("secret".into())).is_none());
        assert!(ApiConfig::resolve(Some("  ".into()), None).is_none());

        let config =
            ApiConfig::resolve(Some("http://exams.local/api/".into()), Some(" ".into())).unwrap();
        assert_eq!(config.token, None);
        assert_eq!(
            config.url("/questions/q1/answer"),
            "http://exams.local/api/questions/q1/answer"
        );

        let config = ApiConfig::resolve(Some("http://exams.local".into()), Some("t0k".into()));
        assert_eq!(config.and_then(|c| c.token).as_deref(), Some("t0k"));
    }

    #[test]
    fn parses_question_payload() {
        let json = r#"[{
            "id": "665f1c",
            "subject_id": "math",
            "question": "What is 15% of 200?",
            "options": [{"id": "a", "text": "15"}, {"id": "b", "text": "30"}]
        }]"#;
        let wire: Vec<WireQuestion> = serde_json::from_str(json).unwrap();
        let questions: Vec<Question> = wire
            .into_iter()
            .map(WireQuestion::into_question)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id().as_str(), "665f1c");
        assert_eq!(questions[0].options().len(), 2);
        assert_eq!(questions[0].level(), QuestionLevel::Medium);
    }

    #[test]
    fn duplicate_options_in_payload_are_rejected() {
        let json = r#"{
            "id": "q", "subject_id": "s", "question": "?",
            "options": [{"id": "a", "text": "1"}, {"id": "a", "text": "2"}]
        }"#;
        let wire: WireQuestion = serde_json::from_str(json).unwrap();
        assert!(matches!(
            wire.into_question(),
            Err(ApiError::InvalidQuestion(_))
        ));
    }

    #[test]
    fn parses_answer_payload_with_explanation() {
        let json = r#"{
            "correct": false,
            "correct_answer": "b",
            "explanation": {
                "reasoning": ["10% of 200 is 20", "5% is 10", "20 + 10 = 30"],
                "concept": "Percentages",
                "sources": ["ENEM 2019"],
                "bias_check": "Do not confuse percent with points.",
                "reflection": "How would you estimate this quickly?"
            }
        }"#;
        let wire: WireAnswer = serde_json::from_str(json).unwrap();
        let result = wire.into_result();
        assert!(!result.correct);
        assert_eq!(result.correct_answer, OptionId::new("b"));
        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.reasoning.len(), 3);
        assert_eq!(explanation.bias_check, "Do not confuse percent with points.");
    }

    #[test]
    fn config_joins_paths_without_double_slash() {
        let config = ApiConfig::new("http://localhost:8000/api/v1/").with_token(Some("  ".into()));
        assert_eq!(
            config.url("/questions/q1/answer"),
            "http://localhost:8000/api/v1/questions/q1/answer"
        );
        assert!(config.token.is_none());
    }
}
