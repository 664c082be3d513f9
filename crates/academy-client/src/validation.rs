//! Exercise validation.
//!
//! The validation service grades an attempt against the exercise's tests.
//! Whatever happens on the wire, callers get a [`ValidationVerdict`]:
//!
//! | Outcome                 | `result`  | counts |
//! |-------------------------|-----------|--------|
//! | graded                  | from body | from body |
//! | request timed out       | `timeout` | 0 / 0  |
//! | unreachable / bad body  | `error`   | 0 / 0  |
//! | non-2xx status          | `error`   | 0 / 0, message from `detail` |

use std::fmt;
use std::time::Duration;

use academy_core::{Config, ProgressStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{error_detail, http_client, Result};

/// Grade of one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    /// Every test passed.
    Passed,
    /// At least one test failed.
    Failed,
    /// The attempt could not be graded.
    #[default]
    Error,
    /// Grading did not finish in time.
    Timeout,
}

impl VerdictStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of grading one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationVerdict {
    /// Overall grade.
    pub result: VerdictStatus,
    /// Number of passing tests.
    pub passed_tests: u32,
    /// Number of tests run.
    pub total_tests: u32,
    /// Feedback text from the judge.
    pub feedback: String,
    /// Why grading failed, for `error` and `timeout`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Output of the attempt.
    pub stdout: String,
    /// Error output of the attempt.
    pub stderr: String,
}

impl ValidationVerdict {
    /// A synthetic `error` verdict with zeroed counts.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: VerdictStatus::Error,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A synthetic `timeout` verdict with zeroed counts.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            result: VerdictStatus::Timeout,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the attempt passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.result == VerdictStatus::Passed
    }
}

/// Grades exercise attempts.
#[async_trait]
pub trait ExerciseValidator: Send + Sync {
    /// Grades `code` for one exercise. Never fails; problems become verdicts.
    async fn validate(&self, module_id: &str, exercise_id: &str, code: &str) -> ValidationVerdict;
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    module_id: &'a str,
    exercise_id: &'a str,
    code: &'a str,
}

/// Submits attempts to `POST /api/validate`.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    client: reqwest::Client,
    base_url: String,
}

impl ValidationClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from `apiUrl` and `http.requestTimeoutSeconds`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_base(),
            Duration::from_secs(config.http.request_timeout_seconds),
        )
    }
}

#[async_trait]
impl ExerciseValidator for ValidationClient {
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    async fn validate(&self, module_id: &str, exercise_id: &str, code: &str) -> ValidationVerdict {
        let url = format!("{}/api/validate", self.base_url);
        let request = ValidateRequest {
            module_id,
            exercise_id,
            code,
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(url = %url, "Validation request timed out");
                return ValidationVerdict::timeout("Validation request timed out");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Validation request failed");
                return ValidationVerdict::error(format!("Validation service unreachable: {e}"));
            }
        };

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            warn!(url = %url, detail = %detail, "Validation service returned an error");
            return ValidationVerdict::error(detail);
        }

        match response.json::<ValidationVerdict>().await {
            Ok(verdict) => {
                info!(
                    result = %verdict.result,
                    passed = verdict.passed_tests,
                    total = verdict.total_tests,
                    "Exercise graded"
                );
                verdict
            }
            Err(e) if e.is_timeout() => ValidationVerdict::timeout("Validation request timed out"),
            Err(e) => {
                warn!(url = %url, error = %e, "Malformed validation response");
                ValidationVerdict::error(format!("Invalid response from validation service: {e}"))
            }
        }
    }
}

/// Validates an attempt and records the exercise as completed if it passed.
///
/// Only a `passed` verdict touches the progress store. A persistence failure
/// is logged; the in-memory ledger still holds the completion.
pub async fn submit_exercise(
    validator: &dyn ExerciseValidator,
    store: &mut ProgressStore,
    module_id: &str,
    exercise_id: &str,
    code: &str,
) -> ValidationVerdict {
    let verdict = validator.validate(module_id, exercise_id, code).await;
    if verdict.passed() {
        if let Err(e) = store.complete_exercise(module_id, exercise_id) {
            warn!(
                module_id,
                exercise_id,
                error = %e,
                "Exercise passed but progress could not be saved"
            );
        }
    }
    verdict
}
