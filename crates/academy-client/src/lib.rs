//! HTTP clients for the Academy service.
//!
//! - [`ApiClient`] fetches lessons, the curriculum and documentation summaries.
//! - [`ValidationClient`] submits exercise attempts and always yields a
//!   [`ValidationVerdict`], even when the service is unreachable.
//! - [`submit_exercise`] validates an attempt and records a pass in the
//!   learner's progress.

pub mod api;
pub mod error;
pub mod validation;

use std::time::Duration;

use serde::Deserialize;

pub use api::{ApiClient, DocInfo};
pub use error::{ClientError, Result};
pub use validation::{
    submit_exercise, ExerciseValidator, ValidationClient, ValidationVerdict, VerdictStatus,
};

/// Builds a client whose every request is bounded by `timeout`.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::Build(e.to_string()))
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Reads `detail` from an error response, falling back to `HTTP <status>`.
pub(crate) async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
