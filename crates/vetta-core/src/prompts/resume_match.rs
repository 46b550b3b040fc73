//! Resume-gate prompt: skills 40, projects 40, fit 20.

pub const RESUME_MATCH_SYSTEM: &str = "You are a resume screening analyst. \
Score how well a resume matches a role. Reply with a single JSON object only; \
no prose, no markdown fences. Be conservative: only credit skills and projects \
with concrete evidence in the resume.";

pub const RESUME_MATCH_SCHEMA: &str = r#"{
  "skills_score": 28,
  "projects_score": 30,
  "fit_score": 14,
  "match_score": 72,
  "is_fake": false,
  "summary": "Two sentences on the match quality and any concerns"
}"#;

const USER_TEMPLATE: &str = r#"Score this resume against the role below.

Scoring rubric:
- skills_score (0-40): coverage of the required technical skills
- projects_score (0-40): depth and relevance of projects/experience
- fit_score (0-20): seniority and domain fit
- match_score: the sum (0-100)
- is_fake: true if the resume shows signs of fabrication (implausible claims,
  template-stuffed keywords, contradictory timelines)

Role: {role} ({level})
Required skills: {skills}

Resume text:
---
{resume}
---

Reply with exactly one JSON object in the shape:
{schema}"#;

pub fn resume_match_prompt(role: &str, level: &str, skills: &[String], resume: &str) -> String {
    USER_TEMPLATE
        .replace("{role}", role)
        .replace("{level}", level)
        .replace("{skills}", &skills.join(", "))
        .replace("{resume}", resume)
        .replace("{schema}", RESUME_MATCH_SCHEMA)
}
