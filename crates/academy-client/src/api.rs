//! Lesson API client.

use std::time::Duration;

use academy_core::{Config, Curriculum, LessonContent};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{error_detail, http_client, ClientError, Result};

/// Documentation summary for an API symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocInfo {
    /// Fully qualified symbol, e.g. `torch.zeros`.
    pub symbol: String,
    /// Call signature, when known.
    #[serde(default)]
    pub signature: Option<String>,
    /// Short description, when known.
    #[serde(default)]
    pub description: Option<String>,
    /// Link to the full documentation page.
    pub url: String,
}

/// Fetches lessons and curriculum from the lesson service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
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

    /// Fetches one lesson: metadata, raw body and exercise definitions.
    #[instrument(skip(self))]
    pub async fn get_module(&self, module_id: &str) -> Result<LessonContent> {
        self.get_json(&["api", "modules", module_id]).await
    }

    /// Fetches the ordered curriculum.
    #[instrument(skip(self))]
    pub async fn get_curriculum(&self) -> Result<Curriculum> {
        self.get_json(&["api", "curriculum"]).await
    }

    /// Fetches the documentation summary for `symbol`.
    #[instrument(skip(self))]
    pub async fn get_doc_info(&self, symbol: &str) -> Result<DocInfo> {
        self.get_json(&["api", "docs", "pytorch", symbol]).await
    }

    /// Appends percent-encoded `segments` to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = || ClientError::Build(format!("invalid base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let endpoint = self.endpoint(segments)?;
        let url = endpoint.to_string();
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                detail,
            });
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse {
                url: url.clone(),
                message: e.to_string(),
            })?;
        debug!(url = %url, "Fetched");
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_info_optional_fields() {
        let info: DocInfo = serde_json::from_str(
            r#"{"symbol": "torch.zeros", "url": "https://pytorch.org/docs/stable/generated/torch.zeros.html"}"#,
        )
        .unwrap();
        assert_eq!(info.symbol, "torch.zeros");
        assert_eq!(info.signature, None);
        assert_eq!(info.description, None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_endpoint_encodes_path_segments() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&["api", "docs", "pytorch", "torch.nn.Linear"]).unwrap().as_str(),
            "http://localhost:8000/api/docs/pytorch/torch.nn.Linear"
        );
        assert_eq!(
            client.endpoint(&["api", "docs", "pytorch", "a/b c?#"]).unwrap().as_str(),
            "http://localhost:8000/api/docs/pytorch/a%2Fb%20c%3F%23"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let client = ApiClient::new("http://localhost:8000/academy/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&["api", "curriculum"]).unwrap().as_str(),
            "http://localhost:8000/academy/api/curriculum"
        );
    }

    #[test]
    fn test_invalid_base_url_is_build_error() {
        let client = ApiClient::new("not a url", Duration::from_secs(1)).unwrap();
        assert!(matches!(client.endpoint(&["api"]), Err(ClientError::Build(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.get_curriculum().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
