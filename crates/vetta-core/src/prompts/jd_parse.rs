//! JD parsing prompt: structured extraction of role, level, and skills from
//! raw job-description text.

pub const JD_PARSE_SYSTEM: &str = "You are a technical recruiting analyst. \
Extract structured hiring data from raw job descriptions. \
Reply with a single JSON object only; no prose, no markdown fences. \
If a field is not stated, use your best inference from context rather than leaving it empty.";

/// Shape example supplied to the reformat step.
pub const JD_PARSE_SCHEMA: &str = r#"{
  "role_title": "Backend Engineer",
  "experience_level": "mid",
  "technical_skills": ["Go", "PostgreSQL", "Kubernetes"],
  "soft_skills": ["communication"],
  "responsibilities": ["design and operate services"],
  "qualifications": ["3+ years building production systems"],
  "summary": "One-paragraph role summary"
}"#;

const USER_TEMPLATE: &str = r#"Extract the following from this job description:
- role_title: the job title
- experience_level: one of fresher, junior, mid, senior, lead, executive
- technical_skills: at least 5 concrete technologies or domains when inferable
- soft_skills, responsibilities, qualifications: short string lists
- summary: one paragraph

Job description:
---
{raw_text}
---

Reply with exactly one JSON object in the shape:
{schema}"#;

pub fn jd_parse_prompt(raw_text: &str) -> String {
    USER_TEMPLATE
        .replace("{raw_text}", raw_text)
        .replace("{schema}", JD_PARSE_SCHEMA)
}
