use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{DEFAULT_BASE_URL, RelayConfig};
use crate::utils::http::{send_checked_bytes, send_checked_json};
use crate::{RelayError, Result};

pub(crate) const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const STATUS_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const RESULT_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Client for the provider's async-invoke job API: one call to create a
/// job, repeated status reads, one result read, plus a plain fetch for the
/// image URL the result points at.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AsyncInvokeCreated {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "requestId")]
    request_id_camel: Option<String>,
}

impl InferenceClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: default_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.api_key.clone().unwrap_or_default()).with_base_url(&config.base_url)
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    /// Creates an async job and returns its provider-assigned id. The
    /// provider is inconsistent about the id field name, so every known
    /// variant is checked, first one present wins.
    pub async fn submit(&self, model_id: &str, input: Value) -> Result<String> {
        let body = serde_json::json!({ "model_id": model_id, "input": input });
        let url = self.endpoint("async-invoke");
        let raw: Value = send_checked_json(
            self.apply_auth(self.http.post(url))
                .timeout(SUBMIT_TIMEOUT)
                .json(&body),
        )
        .await?;

        let created: AsyncInvokeCreated = serde_json::from_value(raw.clone())?;
        created
            .request_id
            .or(created.id)
            .or(created.request_id_camel)
            .filter(|id| !id.trim().is_empty())
            .ok_or(RelayError::MalformedResponse {
                detail: "no request id in async-invoke reply".to_string(),
                payload: raw,
            })
    }

    /// Reads the job's current status payload.
    pub async fn status(&self, request_id: &str) -> Result<Value> {
        let url = self.endpoint(&format!("async-invoke/{request_id}/status"));
        send_checked_json(self.apply_auth(self.http.get(url)).timeout(STATUS_TIMEOUT)).await
    }

    /// Fetches the full result payload of a completed job.
    pub async fn result(&self, request_id: &str) -> Result<Value> {
        let url = self.endpoint(&format!("async-invoke/{request_id}"));
        send_checked_json(self.apply_auth(self.http.get(url)).timeout(RESULT_TIMEOUT)).await
    }

    /// Plain GET for an extracted image URL. Returns the body and the
    /// declared content type, if any. No auth header: the URL is typically
    /// a pre-signed blob-store link.
    pub async fn fetch_bytes(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        send_checked_bytes(self.http.get(url).timeout(FETCH_TIMEOUT)).await
    }
}
