//! Adaptive-interview prompts: the detector decides whether an answer
//! warrants a follow-up; the generator authors it.

pub const DETECTOR_SYSTEM: &str = "You decide whether a candidate's answer \
warrants one probing follow-up question. Reply with a single JSON object \
only; no prose, no markdown fences. Summarize the answer in at most 200 \
tokens; downstream prompts use your summary instead of the raw answer.";

pub const DETECTOR_SCHEMA: &str = r#"{
  "need_follow_up": true,
  "confidence": 0.82,
  "reason": "answer names the approach but skips the failure mode",
  "summarized_answer": "Concise summary of what the candidate actually said"
}"#;

const DETECTOR_TEMPLATE: &str = r#"Question asked:
{question}

Candidate answer:
---
{answer}
---

Does this answer leave a gap worth probing with one follow-up question?
Gaps worth probing: missing reasoning, unstated trade-offs, claims without
evidence. Not worth probing: complete answers, or answers so weak a
follow-up would not help.
Reply with exactly one JSON object in the shape:
{schema}"#;

pub fn detector_prompt(question: &str, answer: &str) -> String {
    DETECTOR_TEMPLATE
        .replace("{question}", question)
        .replace("{answer}", answer)
        .replace("{schema}", DETECTOR_SCHEMA)
}

pub const GENERATOR_SYSTEM: &str = "You author one probing follow-up question \
for a technical interview. Reply with a single JSON object only; no prose, no \
markdown fences. The follow-up must target the identified gap and be \
answerable in two to four sentences.";

pub const GENERATOR_SCHEMA: &str = r#"{
  "follow_up_question": "What happens to your design when the cache is cold?",
  "expected_answer": "Key points a strong answer covers"
}"#;

const GENERATOR_TEMPLATE: &str = r#"Original question:
{question}

Candidate answer (summarized):
{summary}

Gap to probe: {reason}
{strict}
Reply with exactly one JSON object in the shape:
{schema}"#;

/// `stricter` is set on the one regeneration attempt after a duplicate.
pub fn generator_prompt(question: &str, summary: &str, reason: &str, stricter: bool) -> String {
    let strict = if stricter {
        "Your previous attempt duplicated an earlier question. Produce a \
         clearly different follow-up: different angle, different wording.\n"
    } else {
        ""
    };
    GENERATOR_TEMPLATE
        .replace("{question}", question)
        .replace("{summary}", summary)
        .replace("{reason}", reason)
        .replace("{strict}", strict)
        .replace("{schema}", GENERATOR_SCHEMA)
}
