//! Remote execution backend.
//!
//! Talks to the execution service:
//!
//! - handshake: `GET {base}/health`, expecting `200`
//! - execute: `POST {base}/api/execute` with `{code, timeout}`
//!
//! Transport failures, non-2xx statuses and unreadable bodies all become
//! failed [`ExecutionResult`]s.

use std::time::Duration;

use academy_core::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{ExecutionBackend, ExecutionResult, RuntimeError};

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    success: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    error: Option<String>,
    /// Seconds, as reported by the service.
    #[serde(default)]
    execution_time: Option<f64>,
}

impl From<ExecuteResponse> for ExecutionResult {
    fn from(response: ExecuteResponse) -> Self {
        let execution_time_ms = response
            .execution_time
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Duration::from_secs_f64(secs).as_millis())
            .map(|ms| u64::try_from(ms).unwrap_or(u64::MAX));
        Self {
            success: response.success,
            stdout: response.stdout,
            stderr: response.stderr,
            error: response.error,
            execution_time_ms,
        }
    }
}

/// Error body returned by the service on non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Reads `detail` from an error response, falling back to `HTTP <status>`.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
    detail.unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Runs code on the execution service over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    exec_timeout_secs: u64,
}

impl RemoteBackend {
    /// Creates a backend for the service at `base_url`.
    ///
    /// `exec_timeout_secs` is sent with each request; `request_timeout`
    /// bounds every HTTP call.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::HttpClient` if the client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        exec_timeout_secs: u64,
        request_timeout: Duration,
    ) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RuntimeError::HttpClient(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            exec_timeout_secs,
        })
    }

    /// Creates a backend from `apiUrl`, `execution.timeoutSeconds` and
    /// `http.requestTimeoutSeconds`.
    pub fn from_config(config: &Config) -> Result<Self, RuntimeError> {
        Self::new(
            config.api_base(),
            config.execution.timeout_seconds,
            Duration::from_secs(config.http.request_timeout_seconds),
        )
    }

    /// Service base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ExecutionBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn initialize(&self) -> Result<(), RuntimeError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RuntimeError::service_unavailable(&url, e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(RuntimeError::service_unavailable(
                &url,
                format!("health check returned HTTP {}", response.status().as_u16()),
            ));
        }
        debug!("Execution service healthy");
        Ok(())
    }

    async fn execute(&self, code: &str) -> ExecutionResult {
        let url = format!("{}/api/execute", self.base_url);
        let request = ExecuteRequest {
            code,
            timeout: self.exec_timeout_secs,
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(url = %url, "Execution request timed out");
                return ExecutionResult::failed("Execution request timed out");
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Execution request failed");
                return ExecutionResult::failed(format!("Execution service unreachable: {e}"));
            }
        };

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            warn!(url = %url, detail = %detail, "Execution service returned an error");
            return ExecutionResult::failed(detail);
        }

        match response.json::<ExecuteResponse>().await {
            Ok(body) => body.into(),
            Err(e) => {
                warn!(url = %url, error = %e, "Malformed execution response");
                ExecutionResult::failed(format!("Invalid response from execution service: {e}"))
            }
        }
    }
}
