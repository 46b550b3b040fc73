//! Per-section question-generation prompts. One call per enabled section
//! per set; the set generator normalizes whatever shape comes back.

use crate::model::Section;

pub const QUESTION_GEN_SYSTEM: &str = "You are an expert technical interviewer \
authoring assessment questions. Reply with a single JSON value only; no prose, \
no markdown fences. Questions must be self-contained and answerable without \
external resources.";

pub const OBJECTIVE_SCHEMA: &str = r#"{
  "questions": [
    {
      "questionId": "objective_0",
      "text": "Which data structure gives O(1) average lookup?",
      "options": [
        {"text": "Hash map", "isCorrect": true},
        {"text": "Linked list", "isCorrect": false},
        {"text": "Binary heap", "isCorrect": false},
        {"text": "Skip list", "isCorrect": false}
      ],
      "points": 1,
      "difficulty": "medium",
      "skill": "data structures"
    }
  ]
}"#;

pub const SUBJECTIVE_SCHEMA: &str = r#"{
  "questions": [
    {
      "questionId": "subjective_0",
      "text": "Describe how you would design a rate limiter for a public API.",
      "expectedAnswer": "Key points a strong answer covers",
      "rubric": "scoring guidance",
      "maxWords": 300,
      "points": 10,
      "difficulty": "medium",
      "skill": "system design"
    }
  ]
}"#;

pub const PROGRAMMING_SCHEMA: &str = r#"{
  "questions": [
    {
      "questionId": "programming_0",
      "title": "Interval merge",
      "problemStatement": "Given intervals..., print the merged list.",
      "starterCode": "",
      "testCases": [
        {"input": "1 3\n2 6", "expectedOutput": "1 6", "isHidden": false, "weight": 1},
        {"input": "1 2\n3 4", "expectedOutput": "1 2\n3 4", "isHidden": true, "weight": 2}
      ],
      "points": 20,
      "difficulty": "hard",
      "skill": "algorithms"
    }
  ]
}"#;

pub fn section_schema(section: Section) -> &'static str {
    match section {
        Section::Objective => OBJECTIVE_SCHEMA,
        Section::Subjective => SUBJECTIVE_SCHEMA,
        Section::Programming => PROGRAMMING_SCHEMA,
    }
}

const USER_TEMPLATE: &str = r#"Author {count} {kind} for a {level} {role} assessment.

Target skills: {skills}
{extra}
Every question must test a listed skill. Spread difficulty across easy, medium and hard.
Reply with exactly one JSON object in the shape:
{schema}"#;

/// Builds the generation prompt for one section of one set. `set_index`
/// varies the instruction so parallel sets do not repeat questions.
pub fn section_prompt(
    section: Section,
    role: &str,
    level: &str,
    skills: &[String],
    count: u32,
    set_index: u32,
) -> String {
    let kind = match section {
        Section::Objective => "multiple-choice questions with exactly one correct option each",
        Section::Subjective => "open-ended questions with expected answers and rubrics",
        Section::Programming => {
            "programming problems with at least one visible and one hidden test case each"
        }
    };
    let extra = format!(
        "This is question set variant {} — produce questions distinct from other variants.",
        set_index + 1
    );
    USER_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{kind}", kind)
        .replace("{level}", level)
        .replace("{role}", role)
        .replace("{skills}", &skills.join(", "))
        .replace("{extra}", &extra)
        .replace("{schema}", section_schema(section))
}
