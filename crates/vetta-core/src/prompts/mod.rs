//! Prompt templates for JD parsing, question generation, resume matching,
//! subjective scoring, and adaptive follow-ups.

pub mod followup;
pub mod jd_parse;
pub mod question_gen;
pub mod resume_match;
pub mod scoring;

pub use followup::{
    detector_prompt, generator_prompt, DETECTOR_SCHEMA, DETECTOR_SYSTEM, GENERATOR_SCHEMA,
    GENERATOR_SYSTEM,
};
pub use jd_parse::{jd_parse_prompt, JD_PARSE_SCHEMA, JD_PARSE_SYSTEM};
pub use question_gen::{section_prompt, section_schema, QUESTION_GEN_SYSTEM};
pub use resume_match::{resume_match_prompt, RESUME_MATCH_SCHEMA, RESUME_MATCH_SYSTEM};
pub use scoring::{subjective_scoring_prompt, SUBJECTIVE_SCORE_SCHEMA, SUBJECTIVE_SCORE_SYSTEM};

/// Reformat request issued when a JSON-mode call returns unparseable output:
/// carries the previous noisy output plus a schema example.
pub fn reformat_prompt(noisy_output: &str, schema_example: &str) -> String {
    format!(
        "Your previous reply could not be parsed as JSON.\n\
         Reply again with ONLY a single valid JSON value matching this shape, \
         no prose, no markdown fences:\n{schema_example}\n\n\
         Previous reply:\n---\n{noisy_output}\n---"
    )
}
