//! Code-sandbox gateway: submit-and-poll wrapper over an external judge,
//! plus batched multi-case execution.
//!
//! Batches join up to five test-case inputs with a fixed separator, run them
//! as a single submission, and split stdout on the same marker, pairing
//! outputs to inputs by index. Output comparison normalizes CRLF and trims
//! trailing whitespace line by line. A failing batch degrades to per-test
//! error records; remaining batches still run.

use crate::config::SandboxConfig;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Fixed marker joining batched test-case inputs and splitting stdout.
pub const TEST_CASE_SEPARATOR: &str = "---TEST_CASE_SEPARATOR---";
/// Maximum test cases per submission.
pub const BATCH_SIZE: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 10;

/// Supported judge languages (id, name, key). The id is the judge's own.
pub const LANGUAGES: &[(u32, &str, &str)] = &[
    (50, "C (GCC 9.2.0)", "c"),
    (54, "C++ (GCC 9.2.0)", "cpp"),
    (62, "Java (OpenJDK 13)", "java"),
    (63, "JavaScript (Node.js 12)", "javascript"),
    (68, "PHP (7.4)", "php"),
    (71, "Python (3.8)", "python"),
    (72, "Ruby (2.7)", "ruby"),
    (73, "Rust (1.40)", "rust"),
    (74, "TypeScript (3.7)", "typescript"),
    (60, "Go (1.13)", "go"),
];

pub fn language_name(language_id: u32) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(id, _, _)| *id == language_id)
        .map(|(_, name, _)| *name)
}

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
}

/// Judge verdict for one submission. `status_id` follows the judge's table:
/// 3 is accepted, 6 compile error, anything above 3 is some failure.
#[derive(Debug, Clone, Default)]
pub struct SubmissionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub status_id: u32,
    pub status_description: String,
}

impl SubmissionOutcome {
    pub fn finished_ok(&self) -> bool {
        self.status_id == 3
    }
}

#[async_trait]
pub trait SandboxClient: Send + Sync {
    async fn execute(&self, submission: &Submission) -> EngineResult<SubmissionOutcome>;
}

// -- HTTP transport ----------------------------------------------------------

#[derive(Deserialize)]
struct CreateResponse {
    token: String,
}

#[derive(Deserialize)]
struct PollStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    status: PollStatus,
}

/// Judge0-style submit-then-poll client.
pub struct HttpSandboxClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSandboxClient {
    pub fn new(config: &SandboxConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-Auth-Token", key),
            None => builder,
        }
    }
}

#[async_trait]
impl SandboxClient for HttpSandboxClient {
    async fn execute(&self, submission: &Submission) -> EngineResult<SubmissionOutcome> {
        let create_url = format!(
            "{}/submissions?base64_encoded=false&wait=false",
            self.endpoint
        );
        let response = self
            .authed(self.client.post(&create_url).json(submission))
            .send()
            .await
            .map_err(|e| EngineError::SandboxUnavailable(format!("submit failed: {e}")))?;
        if !response.status().is_success() {
            return Err(EngineError::SandboxUnavailable(format!(
                "submit rejected with {}",
                response.status()
            )));
        }
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::SandboxUnavailable(format!("submit parse failed: {e}")))?;

        let poll_url = format!("{}/submissions/{}", self.endpoint, created.token);
        for _ in 0..MAX_POLLS {
            tokio::time::sleep(POLL_INTERVAL).await;
            let response = self
                .authed(self.client.get(&poll_url))
                .send()
                .await
                .map_err(|e| EngineError::SandboxUnavailable(format!("poll failed: {e}")))?;
            let polled: PollResponse = response
                .json()
                .await
                .map_err(|e| EngineError::SandboxUnavailable(format!("poll parse failed: {e}")))?;
            // 1 = in queue, 2 = processing
            if polled.status.id > 2 {
                return Ok(SubmissionOutcome {
                    stdout: polled.stdout.unwrap_or_default(),
                    stderr: polled.stderr.unwrap_or_default(),
                    compile_output: polled.compile_output.unwrap_or_default(),
                    status_id: polled.status.id,
                    status_description: polled.status.description,
                });
            }
        }
        Err(EngineError::SandboxTimeout)
    }
}

// -- Batched execution --------------------------------------------------------

/// One test case to run; `expected_output` is what stdout must normalize to.
#[derive(Debug, Clone)]
pub struct CaseSpec {
    pub input: String,
    pub expected_output: String,
}

/// Outcome of one test case after normalization and comparison.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub actual_output: String,
    pub passed: bool,
    pub error: Option<String>,
}

pub struct SandboxGateway {
    client: Arc<dyn SandboxClient>,
}

impl SandboxGateway {
    pub fn new(client: Arc<dyn SandboxClient>) -> Self {
        Self { client }
    }

    /// Runs `cases` against `code`, batching up to [`BATCH_SIZE`] per
    /// submission. Fails open per batch: a batch-level error records an
    /// error on each of its cases and the remaining batches still execute.
    pub async fn run_test_cases(
        &self,
        code: &str,
        language_id: u32,
        cases: &[CaseSpec],
    ) -> Vec<CaseOutcome> {
        let mut outcomes = Vec::with_capacity(cases.len());
        for batch in cases.chunks(BATCH_SIZE) {
            match self.run_batch(code, language_id, batch).await {
                Ok(mut batch_outcomes) => outcomes.append(&mut batch_outcomes),
                Err(e) => {
                    warn!(error = %e, batch_len = batch.len(), "sandbox batch failed");
                    for _ in batch {
                        outcomes.push(CaseOutcome {
                            actual_output: String::new(),
                            passed: false,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }
        outcomes
    }

    async fn run_batch(
        &self,
        code: &str,
        language_id: u32,
        batch: &[CaseSpec],
    ) -> EngineResult<Vec<CaseOutcome>> {
        let stdin = batch
            .iter()
            .map(|c| c.input.as_str())
            .collect::<Vec<_>>()
            .join(&format!("\n{TEST_CASE_SEPARATOR}\n"));
        let submission = Submission {
            source_code: code.to_string(),
            language_id,
            stdin,
        };
        let outcome = self.client.execute(&submission).await?;

        if !outcome.finished_ok() && outcome.stdout.is_empty() {
            let detail = if !outcome.compile_output.is_empty() {
                outcome.compile_output.clone()
            } else if !outcome.stderr.is_empty() {
                outcome.stderr.clone()
            } else {
                outcome.status_description.clone()
            };
            return Ok(batch
                .iter()
                .map(|_| CaseOutcome {
                    actual_output: String::new(),
                    passed: false,
                    error: Some(detail.clone()),
                })
                .collect());
        }

        let pieces = split_batched_stdout(&outcome.stdout);
        Ok(batch
            .iter()
            .enumerate()
            .map(|(i, case)| match pieces.get(i) {
                Some(actual) => CaseOutcome {
                    actual_output: actual.clone(),
                    passed: outputs_match(actual, &case.expected_output),
                    error: None,
                },
                None => CaseOutcome {
                    actual_output: String::new(),
                    passed: false,
                    error: Some("no output produced for this case".to_string()),
                },
            })
            .collect())
    }
}

/// Splits batched stdout on the separator marker.
pub fn split_batched_stdout(stdout: &str) -> Vec<String> {
    stdout
        .split(TEST_CASE_SEPARATOR)
        .map(|piece| piece.trim_matches('\n').to_string())
        .collect()
}

/// Normalizes CRLF, trims trailing whitespace per line, and drops trailing
/// blank lines before comparing.
pub fn normalize_output(output: &str) -> String {
    let unified = output.replace("\r\n", "\n");
    let mut lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_handles_crlf_and_trailing_space() {
        assert!(outputs_match("42 \r\n", "42"));
        assert!(outputs_match("a\nb  \n\n", "a\nb"));
        assert!(!outputs_match("a\nb", "a\nc"));
    }

    #[test]
    fn split_pairs_outputs_by_index() {
        let stdout = format!("3\n{TEST_CASE_SEPARATOR}\n7\n{TEST_CASE_SEPARATOR}\n11");
        let pieces = split_batched_stdout(&stdout);
        assert_eq!(pieces, vec!["3", "7", "11"]);
    }

    #[test]
    fn fewer_outputs_than_inputs_is_detectable() {
        let stdout = format!("3\n{TEST_CASE_SEPARATOR}\n7");
        let pieces = split_batched_stdout(&stdout);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.get(2).is_none());
    }

    #[test]
    fn language_table_resolves_known_ids() {
        assert!(language_name(71).unwrap().contains("Python"));
        assert!(language_name(9999).is_none());
    }
}
