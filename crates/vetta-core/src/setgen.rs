//! Set generator: per-section LLM fan-out producing N independent question
//! sets for a JD.
//!
//! Calls run sequentially — per-section within a set and across sets, with a
//! small inter-call delay — to stay inside provider rate limits. Responses
//! are normalized defensively: every field is treated as optional with
//! defaults, and several key aliases are accepted. A failure in any section
//! aborts the whole generation and already-persisted sets are removed; the
//! ordered set-id list lands on the JD in a single field update only after
//! every set persisted.

use crate::error::{EngineError, EngineResult};
use crate::llm::{LlmGateway, LlmRequest};
use crate::model::{
    AnswerOption, AssessmentSet, Difficulty, JobDescription, ObjectiveQuestion, ParsedContent,
    ProgrammingQuestion, Section, SubjectiveQuestion, TestCase,
};
use crate::prompts;
use crate::store::Store;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const INTER_CALL_DELAY: Duration = Duration::from_millis(250);

const DEFAULT_OBJECTIVE_POINTS: u32 = 1;
const DEFAULT_SUBJECTIVE_POINTS: u32 = 10;
const DEFAULT_PROGRAMMING_POINTS: u32 = 20;
const DEFAULT_MAX_WORDS: u32 = 300;

pub struct SetGenerator {
    store: Arc<Store>,
    llm: Arc<LlmGateway>,
}

impl SetGenerator {
    pub fn new(store: Arc<Store>, llm: Arc<LlmGateway>) -> Self {
        Self { store, llm }
    }

    /// Generates and persists all sets for a JD, returning the ordered id
    /// list after writing it to the JD. On failure nothing is referenced:
    /// sets persisted before the failure are deleted again.
    pub async fn generate_for_jd(&self, jd: &JobDescription) -> EngineResult<Vec<String>> {
        let parsed = jd
            .parsed
            .as_ref()
            .ok_or_else(|| EngineError::invalid("status", "JD must be parsed before generation"))?;
        let count = jd.config.num_sets.clamp(1, 10);
        let mut set_ids: Vec<String> = Vec::new();

        for set_index in 0..count {
            match self.generate_one_set(jd, parsed, set_index).await {
                Ok(set) => {
                    self.store.insert_set(&set)?;
                    info!(jd_id = %jd.id, set_id = %set.id, set_index, "assessment set persisted");
                    set_ids.push(set.id);
                }
                Err(e) => {
                    warn!(jd_id = %jd.id, set_index, error = %e, "set generation failed, rolling back");
                    for id in &set_ids {
                        self.store.delete_set(id)?;
                    }
                    return Err(e);
                }
            }
            tokio::time::sleep(INTER_CALL_DELAY).await;
        }

        let ids = set_ids.clone();
        self.store.update_jd(&jd.id, move |j| {
            j.set_ids = ids.clone();
            Ok(())
        })?;
        Ok(set_ids)
    }

    async fn generate_one_set(
        &self,
        jd: &JobDescription,
        parsed: &ParsedContent,
        set_index: u32,
    ) -> EngineResult<AssessmentSet> {
        let mut set = AssessmentSet::new(&jd.id, format!("Set {}", set_index + 1));
        let role = if parsed.role_title.is_empty() {
            jd.title.as_str()
        } else {
            parsed.role_title.as_str()
        };
        let level = parsed
            .experience_level
            .map(|l| format!("{l:?}").to_lowercase())
            .unwrap_or_else(|| "mid".to_string());

        for section in Section::ORDER {
            let section_config = jd.config.sections.get(section);
            if !section_config.enabled || section_config.question_count == 0 {
                continue;
            }
            let mut prompt = prompts::section_prompt(
                section,
                role,
                &level,
                &parsed.technical_skills,
                section_config.question_count,
                set_index,
            );
            if let Some(notes) = &jd.rubric_notes {
                prompt.push_str("\nRecruiter guidance: ");
                prompt.push_str(notes);
            }
            let request = LlmRequest::new(prompt)
                .with_system(prompts::QUESTION_GEN_SYSTEM)
                .with_temperature(0.7);
            let value = self
                .llm
                .complete_json(&request, prompts::section_schema(section))
                .await?;
            let questions = questions_array(&value).ok_or_else(|| {
                EngineError::LlmBadJson(format!("no question array for section {section}"))
            })?;
            if questions.is_empty() {
                return Err(EngineError::LlmBadJson(format!(
                    "empty question array for section {section}"
                )));
            }
            match section {
                Section::Objective => {
                    for (i, q) in questions.iter().enumerate() {
                        set.objective.push(normalize_objective(q, i));
                    }
                }
                Section::Subjective => {
                    for (i, q) in questions.iter().enumerate() {
                        set.subjective.push(normalize_subjective(q, i));
                    }
                }
                Section::Programming => {
                    for (i, q) in questions.iter().enumerate() {
                        set.programming.push(normalize_programming(q, i));
                    }
                }
            }
            tokio::time::sleep(INTER_CALL_DELAY).await;
        }

        set.finalize();
        Ok(set)
    }
}

// -- Response normalization ---------------------------------------------------

/// Accepts a top-level array, `{questions: [...]}`, or falls back to the
/// first array-valued property.
pub fn questions_array(value: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = value {
        return Some(items);
    }
    let object = value.as_object()?;
    if let Some(Value::Array(items)) = object.get("questions") {
        return Some(items);
    }
    object.values().find_map(|v| v.as_array())
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn u32_field(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|k| value.get(*k))
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
}

fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| value.get(*k)).and_then(|v| v.as_bool())
}

fn difficulty_field(value: &Value) -> Difficulty {
    match str_field(value, &["difficulty"]).as_deref() {
        Some("easy") => Difficulty::Easy,
        Some("hard") => Difficulty::Hard,
        _ => Difficulty::Medium,
    }
}

fn question_id(value: &Value, section: Section, index: usize) -> String {
    str_field(value, &["questionId", "question_id", "id"])
        .unwrap_or_else(|| format!("{section}_{index}"))
}

fn normalize_objective(value: &Value, index: usize) -> ObjectiveQuestion {
    let mut options: Vec<AnswerOption> = value
        .get("options")
        .and_then(|v| v.as_array())
        .map(|opts| {
            opts.iter()
                .map(|o| match o {
                    Value::String(text) => AnswerOption {
                        text: text.clone(),
                        is_correct: false,
                    },
                    other => AnswerOption {
                        text: str_field(other, &["text", "option"]).unwrap_or_default(),
                        is_correct: bool_field(other, &["isCorrect", "is_correct", "correct"])
                            .unwrap_or(false),
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    // Some models mark the answer with an index field instead of a flag.
    if !options.iter().any(|o| o.is_correct) {
        if let Some(correct) =
            u32_field(value, &["correctOption", "correct_option", "correctIndex", "answerIndex"])
        {
            if let Some(option) = options.get_mut(correct as usize) {
                option.is_correct = true;
            }
        }
    }

    ObjectiveQuestion {
        question_id: question_id(value, Section::Objective, index),
        text: str_field(value, &["text", "question"]).unwrap_or_default(),
        options,
        points: u32_field(value, &["points"]).unwrap_or(DEFAULT_OBJECTIVE_POINTS),
        difficulty: difficulty_field(value),
        skill: str_field(value, &["skill", "topic"]),
    }
}

fn normalize_subjective(value: &Value, index: usize) -> SubjectiveQuestion {
    SubjectiveQuestion {
        question_id: question_id(value, Section::Subjective, index),
        text: str_field(value, &["text", "question"]).unwrap_or_default(),
        expected_answer: str_field(value, &["expectedAnswer", "expected_answer", "answer"])
            .unwrap_or_default(),
        rubric: str_field(value, &["rubric"]),
        max_words: u32_field(value, &["maxWords", "max_words"]).unwrap_or(DEFAULT_MAX_WORDS),
        points: u32_field(value, &["points"]).unwrap_or(DEFAULT_SUBJECTIVE_POINTS),
        difficulty: difficulty_field(value),
        skill: str_field(value, &["skill", "topic"]),
    }
}

fn normalize_programming(value: &Value, index: usize) -> ProgrammingQuestion {
    let test_cases = value
        .get("testCases")
        .or_else(|| value.get("test_cases"))
        .and_then(|v| v.as_array())
        .map(|cases| {
            cases
                .iter()
                .map(|c| TestCase {
                    input: str_field(c, &["input", "stdin"]).unwrap_or_default(),
                    expected_output: str_field(
                        c,
                        &["expectedOutput", "expected_output", "output"],
                    )
                    .unwrap_or_default(),
                    is_hidden: bool_field(c, &["isHidden", "is_hidden", "hidden"]).unwrap_or(false),
                    weight: u32_field(c, &["weight"]).unwrap_or(1),
                })
                .collect()
        })
        .unwrap_or_default();

    ProgrammingQuestion {
        question_id: question_id(value, Section::Programming, index),
        title: str_field(value, &["title"]).unwrap_or_else(|| format!("Problem {}", index + 1)),
        problem_statement: str_field(
            value,
            &["problemStatement", "problem_statement", "text", "question"],
        )
        .unwrap_or_default(),
        starter_code: str_field(value, &["starterCode", "starter_code"]),
        test_cases,
        points: u32_field(value, &["points"]).unwrap_or(DEFAULT_PROGRAMMING_POINTS),
        difficulty: difficulty_field(value),
        skill: str_field(value, &["skill", "topic"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_wrapped_and_bare_arrays() {
        let wrapped = json!({"questions": [{"text": "a"}]});
        assert_eq!(questions_array(&wrapped).unwrap().len(), 1);
        let bare = json!([{"text": "a"}, {"text": "b"}]);
        assert_eq!(questions_array(&bare).unwrap().len(), 2);
        let oddly_named = json!({"items": [{"text": "a"}]});
        assert_eq!(questions_array(&oddly_named).unwrap().len(), 1);
        assert!(questions_array(&json!({"note": "none"})).is_none());
    }

    #[test]
    fn missing_question_id_gets_section_default() {
        let q = normalize_subjective(&json!({"text": "why?"}), 3);
        assert_eq!(q.question_id, "subjective_3");
        assert_eq!(q.points, DEFAULT_SUBJECTIVE_POINTS);
        assert_eq!(q.max_words, DEFAULT_MAX_WORDS);
    }

    #[test]
    fn correct_index_alias_marks_an_option() {
        let q = normalize_objective(
            &json!({
                "text": "pick",
                "options": ["a", "b", "c"],
                "correctOption": 1
            }),
            0,
        );
        assert!(q.options[1].is_correct);
        assert_eq!(q.options.iter().filter(|o| o.is_correct).count(), 1);
    }

    #[test]
    fn expected_output_alias_is_normalized() {
        let q = normalize_programming(
            &json!({
                "title": "sum",
                "problemStatement": "add",
                "testCases": [{"input": "1 2", "output": "3", "hidden": true, "weight": 2}]
            }),
            0,
        );
        assert_eq!(q.test_cases[0].expected_output, "3");
        assert!(q.test_cases[0].is_hidden);
        assert_eq!(q.test_cases[0].weight, 2);
    }
}
