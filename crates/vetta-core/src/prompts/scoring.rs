//! Subjective-answer scoring prompt, driven by the question's expected
//! answer and rubric.

pub const SUBJECTIVE_SCORE_SYSTEM: &str = "You are grading a candidate's \
written answer in a timed technical assessment. Score strictly against the \
expected answer and rubric. Reply with a single JSON object only; no prose, \
no markdown fences.";

pub const SUBJECTIVE_SCORE_SCHEMA: &str = r#"{
  "score": 7.5,
  "max_score": 10,
  "feedback": "One or two sentences on what was strong or missing"
}"#;

const USER_TEMPLATE: &str = r#"Question ({points} points):
{question}

Expected answer:
{expected}

Rubric:
{rubric}

Candidate answer:
---
{answer}
---

Score the answer from 0 to {points} (fractions allowed). An empty or
off-topic answer scores 0. Reply with exactly one JSON object in the shape:
{schema}"#;

pub fn subjective_scoring_prompt(
    question: &str,
    expected: &str,
    rubric: Option<&str>,
    points: u32,
    answer: &str,
) -> String {
    USER_TEMPLATE
        .replace("{question}", question)
        .replace("{expected}", expected)
        .replace("{rubric}", rubric.unwrap_or("accuracy, depth, clarity"))
        .replace("{points}", &points.to_string())
        .replace("{answer}", answer)
        .replace("{schema}", SUBJECTIVE_SCORE_SCHEMA)
}
