use std::collections::HashMap;

use prep_core::model::{
    AnswerKey, AnswerOption, Difficulty, ExamId, Explanation, OptionId, Question, QuestionId,
    QuestionLevel, SubjectId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_from_usize, ser};
use crate::repository::{QuestionRecord, QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, record: &QuestionRecord) -> Result<(), StorageError> {
        let question = &record.question;
        let explanation = serde_json::to_string(&record.answer_key.explanation).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, exam_id, subject_id, prompt, level, correct_answer, explanation
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                exam_id = excluded.exam_id,
                subject_id = excluded.subject_id,
                prompt = excluded.prompt,
                level = excluded.level,
                correct_answer = excluded.correct_answer,
                explanation = excluded.explanation
            ",
        )
        .bind(question.id().as_str())
        .bind(record.exam_id.as_str())
        .bind(question.subject_id().as_str())
        .bind(question.prompt())
        .bind(question.level().as_str())
        .bind(record.answer_key.correct_answer.as_str())
        .bind(explanation)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM question_options WHERE question_id = ?1")
            .bind(question.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, option) in question.options().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO question_options (question_id, position, option_id, text)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(question.id().as_str())
            .bind(i64_from_usize("position", position)?)
            .bind(option.id.as_str())
            .bind(option.text.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_questions(
        &self,
        exam_id: &ExamId,
        subject_id: &SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, StorageError> {
        let mut sql = String::from(
            r"
                SELECT id, subject_id, prompt, level
                FROM questions
                WHERE exam_id = ?1 AND subject_id = ?2
            ",
        );
        if difficulty.level().is_some() {
            sql.push_str(" AND level = ?3");
        }
        sql.push_str(" ORDER BY seq ASC");

        let mut query = sqlx::query(&sql)
            .bind(exam_id.as_str())
            .bind(subject_id.as_str());
        if let Some(level) = difficulty.level() {
            query = query.bind(level.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let option_rows = sqlx::query(
            r"
                SELECT o.question_id, o.option_id, o.text
                FROM question_options o
                JOIN questions q ON q.id = o.question_id
                WHERE q.exam_id = ?1 AND q.subject_id = ?2
                ORDER BY o.question_id, o.position
            ",
        )
        .bind(exam_id.as_str())
        .bind(subject_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut options: HashMap<String, Vec<AnswerOption>> = HashMap::new();
        for row in option_rows {
            let question_id: String = row.try_get("question_id").map_err(ser)?;
            let option_id: String = row.try_get("option_id").map_err(ser)?;
            let text: String = row.try_get("text").map_err(ser)?;
            options
                .entry(question_id)
                .or_default()
                .push(AnswerOption::new(OptionId::new(option_id), text));
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(ser)?;
            let level = QuestionLevel::parse(&row.try_get::<String, _>("level").map_err(ser)?)
                .map_err(ser)?;
            let question = Question::new(
                QuestionId::new(id.clone()),
                SubjectId::new(row.try_get::<String, _>("subject_id").map_err(ser)?),
                row.try_get::<String, _>("prompt").map_err(ser)?,
                options.remove(&id).unwrap_or_default(),
                level,
            )
            .map_err(ser)?;
            out.push(question);
        }

        Ok(out)
    }

    async fn answer_key(&self, question_id: &QuestionId) -> Result<AnswerKey, StorageError> {
        let row = sqlx::query("SELECT correct_answer, explanation FROM questions WHERE id = ?1")
            .bind(question_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let correct: String = row.try_get("correct_answer").map_err(ser)?;
        let explanation: Explanation =
            serde_json::from_str(&row.try_get::<String, _>("explanation").map_err(ser)?)
                .map_err(ser)?;
        Ok(AnswerKey::new(OptionId::new(correct), explanation))
    }
}
