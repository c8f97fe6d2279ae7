use prep_core::model::{
    AnswerKey, AnswerOption, ExamId, Explanation, Question, QuestionError, QuestionId,
    QuestionLevel, SubjectId,
};
use storage::repository::QuestionRecord;

struct SampleQuestion {
    id: &'static str,
    prompt: &'static str,
    options: [(&'static str, &'static str); 4],
    correct: &'static str,
    level: QuestionLevel,
    concept: &'static str,
    reasoning: &'static [&'static str],
}

const SAMPLES: &[SampleQuestion] = &[
    SampleQuestion {
        id: "sample-percent-1",
        prompt: "What is 15% of 200?",
        options: [("a", "15"), ("b", "20"), ("c", "30"), ("d", "35")],
        correct: "c",
        level: QuestionLevel::Easy,
        concept: "Percentages",
        reasoning: &["10% of 200 is 20", "5% of 200 is 10", "20 + 10 = 30"],
    },
    SampleQuestion {
        id: "sample-ratio-1",
        prompt: "A recipe uses 3 cups of flour for 2 cakes. How many cups for 5 cakes?",
        options: [("a", "6"), ("b", "7.5"), ("c", "8"), ("d", "10")],
        correct: "b",
        level: QuestionLevel::Easy,
        concept: "Proportions",
        reasoning: &["One cake needs 1.5 cups", "5 x 1.5 = 7.5"],
    },
    SampleQuestion {
        id: "sample-linear-1",
        prompt: "Solve for x: 3x - 7 = 11.",
        options: [("a", "4"), ("b", "5"), ("c", "6"), ("d", "18")],
        correct: "c",
        level: QuestionLevel::Medium,
        concept: "Linear equations",
        reasoning: &["Add 7 to both sides: 3x = 18", "Divide by 3: x = 6"],
    },
    SampleQuestion {
        id: "sample-prob-1",
        prompt: "Two fair coins are tossed. What is the probability of exactly one head?",
        options: [("a", "1/4"), ("b", "1/3"), ("c", "1/2"), ("d", "3/4")],
        correct: "c",
        level: QuestionLevel::Medium,
        concept: "Probability",
        reasoning: &["Outcomes: HH, HT, TH, TT", "Exactly one head: HT, TH", "2 of 4 = 1/2"],
    },
    SampleQuestion {
        id: "sample-geo-1",
        prompt: "A right triangle has legs 6 and 8. What is the hypotenuse?",
        options: [("a", "10"), ("b", "12"), ("c", "14"), ("d", "48")],
        correct: "a",
        level: QuestionLevel::Medium,
        concept: "Pythagorean theorem",
        reasoning: &["6^2 + 8^2 = 36 + 64 = 100", "The square root of 100 is 10"],
    },
    SampleQuestion {
        id: "sample-growth-1",
        prompt: "A price rises 10% and then falls 10%. What is the net change?",
        options: [("a", "0%"), ("b", "-1%"), ("c", "+1%"), ("d", "-10%")],
        correct: "b",
        level: QuestionLevel::Hard,
        concept: "Successive percentage changes",
        reasoning: &["1.10 x 0.90 = 0.99", "The final price is 99% of the original"],
    },
];

/// Built-in practice questions for a fresh database.
pub fn sample_records(
    exam_id: &ExamId,
    subject_id: &SubjectId,
) -> Result<Vec<QuestionRecord>, QuestionError> {
    SAMPLES
        .iter()
        .map(|sample| {
            let question = Question::new(
                QuestionId::new(sample.id),
                subject_id.clone(),
                sample.prompt,
                sample
                    .options
                    .iter()
                    .map(|(id, text)| AnswerOption::new(*id, *text))
                    .collect(),
                sample.level,
            )?;
            let explanation = Explanation {
                reasoning: sample.reasoning.iter().map(|s| (*s).to_owned()).collect(),
                concept: sample.concept.to_owned(),
                bias_check: "Check the answer against a quick estimate before committing.".into(),
                reflection: "Which step would you verify first under time pressure?".into(),
                sources: vec!["Built-in sample set".into()],
            };
            Ok(QuestionRecord::new(
                exam_id.clone(),
                question,
                AnswerKey::new(sample.correct, explanation),
            ))
        })
        .collect()
}
