//! Academy code execution.
//!
//! Learner code runs through an [`ExecutionGateway`], which owns one
//! [`ExecutionBackend`] chosen at startup:
//!
//! - [`LocalBackend`]: a sandboxed interpreter managed by this process
//! - [`RemoteBackend`]: an execution service reached over HTTP
//!
//! Every call yields an [`ExecutionResult`]; faults in learner code, the
//! interpreter or the network are reported inside the result, never as a
//! panic or an `Err`.

pub mod gateway;
pub mod local;
pub mod remote;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gateway::{ExecutionGateway, GatewayState};
pub use local::{Interpreter, LocalBackend, PythonInterpreter, RunOutput};
pub use remote::RemoteBackend;

/// Error reported by `execute` before the gateway is ready.
pub const NOT_READY_ERROR: &str = "Execution runtime not ready";

/// Errors raised while bringing a backend up.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The interpreter executable could not be started.
    #[error("failed to start interpreter '{program}': {message}\n\nSuggestion: Install Python 3 or set execution.interpreter in academy.json")]
    InterpreterUnavailable {
        /// Executable that was launched.
        program: String,
        /// Underlying error.
        message: String,
    },

    /// The interpreter started but the warm-up script failed.
    #[error("interpreter warm-up failed: {0}\n\nSuggestion: Check that every module in execution.preloadModules is installed")]
    WarmupFailed(String),

    /// The remote service did not answer its health check.
    #[error("execution service at {url} is unavailable: {message}\n\nSuggestion: Start the service or switch to \"backend\": \"local\"")]
    ServiceUnavailable {
        /// Health check URL.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Initialization failed; the gateway will retry on the next call.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend name.
        backend: &'static str,
        /// Failure reason from the handshake.
        reason: String,
    },

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Creates an `InterpreterUnavailable` error.
    #[must_use]
    pub fn interpreter_unavailable(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InterpreterUnavailable {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Creates a `ServiceUnavailable` error.
    #[must_use]
    pub fn service_unavailable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if calling `initialize` again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. } | Self::BackendUnavailable { .. } | Self::Io(_)
        )
    }
}

/// Outcome of one execution request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the code ran to completion without an uncaught fault.
    pub success: bool,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error, including any fault trace.
    #[serde(default)]
    pub stderr: String,
    /// Short error description for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time of the call in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl ExecutionResult {
    /// A successful run.
    #[must_use]
    pub fn succeeded(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
            error: None,
            execution_time_ms: None,
        }
    }

    /// A failed run with no captured output.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            execution_time_ms: None,
        }
    }

    /// The result `execute` returns before the gateway is ready.
    #[must_use]
    pub fn not_ready() -> Self {
        Self::failed(NOT_READY_ERROR)
    }

    /// Attaches captured output.
    #[must_use]
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Attaches the elapsed time.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.execution_time_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Attaches an elapsed time given in milliseconds.
    #[must_use]
    pub const fn with_elapsed_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }
}

/// One way of running learner code.
///
/// Implementations must never panic or return early from `execute` with an
/// error: every outcome is an [`ExecutionResult`].
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short name used in logs, e.g. `local`.
    fn name(&self) -> &'static str;

    /// Brings the backend up. Called once per successful gateway lifetime.
    async fn initialize(&self) -> Result<(), RuntimeError>;

    /// Runs `code` and reports the outcome.
    async fn execute(&self, code: &str) -> ExecutionResult;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_result() {
        let result = ExecutionResult::not_ready();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Execution runtime not ready"));
        assert!(result.stdout.is_empty());
        assert_eq!(result.execution_time_ms, None);
    }

    #[test]
    fn test_builders() {
        let result = ExecutionResult::failed("boom")
            .with_output("partial\n", "Traceback ...\nValueError: boom\n")
            .with_elapsed(Duration::from_millis(1500));
        assert!(!result.success);
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.execution_time_ms, Some(1500));
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_value(ExecutionResult::succeeded("hi\n", "").with_elapsed_ms(3))
            .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["executionTimeMs"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_messages_and_retryability() {
        let err = RuntimeError::interpreter_unavailable("python3", "No such file");
        assert!(err.to_string().contains("python3"));
        assert!(err.to_string().contains("Suggestion"));
        assert!(!err.is_retryable());

        assert!(RuntimeError::service_unavailable("http://x/health", "refused").is_retryable());
    }
}
