use chrono::Duration;
use prep_core::model::{
    AnswerKey, AnswerOption, AnsweredEntry, CompletionReason, Difficulty, ExamId, Explanation,
    OptionId, Question, QuestionId, QuestionLevel, SessionId, SessionSummary, SubjectId,
};
use prep_core::time::fixed_now;
use storage::repository::{
    QuestionRecord, QuestionRepository, SessionSummaryRepository, StorageError,
};
use storage::sqlite::{SCHEMA_VERSION, SqliteRepository};

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn record(id: &str, level: QuestionLevel, options: &[&str], correct: &str) -> QuestionRecord {
    let question = Question::new(
        QuestionId::new(id),
        SubjectId::new("math"),
        format!("Prompt {id}"),
        options
            .iter()
            .map(|o| AnswerOption::new(*o, format!("text {o}")))
            .collect(),
        level,
    )
    .unwrap();
    QuestionRecord::new(
        ExamId::new("enem"),
        question,
        AnswerKey::new(
            correct,
            Explanation {
                reasoning: vec!["step one".into(), "step two".into()],
                concept: "Fractions".into(),
                bias_check: "Watch for anchoring".into(),
                reflection: "What did you assume?".into(),
                sources: vec!["Textbook ch. 3".into()],
            },
        ),
    )
}

#[tokio::test]
async fn sqlite_questions_keep_order_options_and_keys() {
    let repo = connect("memdb_questions").await;
    repo.upsert_question(&record("q1", QuestionLevel::Easy, &["a", "b", "c"], "c"))
        .await
        .unwrap();
    repo.upsert_question(&record("q2", QuestionLevel::Hard, &["x", "y"], "x"))
        .await
        .unwrap();
    // Re-upserting keeps the original position but replaces options.
    repo.upsert_question(&record("q1", QuestionLevel::Easy, &["a", "b"], "a"))
        .await
        .unwrap();

    let exam = ExamId::new("enem");
    let math = SubjectId::new("math");
    let all = repo
        .list_questions(&exam, &math, Difficulty::Mixed)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id().as_str(), "q1");
    let option_ids: Vec<_> = all[0].options().iter().map(|o| o.id.as_str()).collect();
    assert_eq!(option_ids, ["a", "b"]);
    assert_eq!(all[1].level(), QuestionLevel::Hard);

    let easy = repo
        .list_questions(&exam, &math, Difficulty::Easy)
        .await
        .unwrap();
    assert_eq!(easy.len(), 1);

    let key = repo.answer_key(&QuestionId::new("q1")).await.unwrap();
    assert_eq!(key.correct_answer, OptionId::new("a"));
    assert_eq!(key.explanation.reasoning.len(), 2);
    assert_eq!(key.explanation.concept, "Fractions");

    let missing = repo.answer_key(&QuestionId::new("nope")).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));

    let other_subject = repo
        .list_questions(&exam, &SubjectId::new("bio"), Difficulty::Mixed)
        .await
        .unwrap();
    assert!(other_subject.is_empty());
}

#[tokio::test]
async fn sqlite_summaries_persist_answers_and_order() {
    let repo = connect("memdb_summaries").await;
    let start = fixed_now();
    let answers = vec![
        AnsweredEntry {
            index: 0,
            question_id: QuestionId::new("q1"),
            selected: OptionId::new("a"),
            correct: true,
            time_spent_ms: 4_200,
        },
        AnsweredEntry {
            index: 1,
            question_id: QuestionId::new("q2"),
            selected: OptionId::new("y"),
            correct: false,
            time_spent_ms: 9_000,
        },
    ];

    let first = SessionSummary::from_log(
        SessionId::generate(),
        ExamId::new("enem"),
        SubjectId::new("math"),
        5,
        &answers,
        start,
        start + Duration::minutes(3),
        CompletionReason::Stopped,
    )
    .unwrap();
    let second = SessionSummary::from_log(
        SessionId::generate(),
        ExamId::new("enem"),
        SubjectId::new("math"),
        2,
        &answers,
        start,
        start + Duration::minutes(7),
        CompletionReason::Finished,
    )
    .unwrap();

    let first_id = repo.append_summary(&first, &answers).await.unwrap();
    let second_id = repo.append_summary(&second, &[]).await.unwrap();
    assert!(matches!(
        repo.append_summary(&first, &[]).await,
        Err(StorageError::Conflict)
    ));

    let fetched = repo.get_summary(first_id).await.unwrap();
    assert_eq!(fetched, first);
    assert_eq!(fetched.score(), 1);
    assert_eq!(fetched.reason(), CompletionReason::Stopped);

    let stored_answers = repo.list_answers(first_id).await.unwrap();
    assert_eq!(stored_answers, answers);
    assert!(repo.list_answers(second_id).await.unwrap().is_empty());
    assert!(matches!(
        repo.list_answers(999).await,
        Err(StorageError::NotFound)
    ));

    let rows = repo
        .list_summary_rows(&ExamId::new("enem"), &SubjectId::new("math"), 10)
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, [second_id, first_id]);
}

#[tokio::test]
async fn migrations_record_version_and_rerun_cleanly() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_schema?mode=memory&cache=shared")
        .await
        .expect("connect");
    assert_eq!(repo.schema_version().await.unwrap(), 0);

    repo.migrate().await.unwrap();
    repo.migrate().await.unwrap();
    assert_eq!(repo.schema_version().await.unwrap(), SCHEMA_VERSION);
}
