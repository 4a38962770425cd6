//! HTTP Client
//!
//! Single-attempt POST to the completion endpoint. Retrying is the
//! dispatcher's job; this layer only classifies what went wrong.

use crate::api::{CompletionRequest, CompletionResponse};
use crate::error::{AttemptError, RelayError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

/// HTTP client for the upstream completion endpoint
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Full completion URL
    endpoint: String,
}

impl HttpClient {
    /// Create a new HTTP client with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| RelayError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one completion request and return the first choice's text
    pub async fn post_completion(
        &self,
        request: &CompletionRequest<'_>,
        api_key: &str,
    ) -> std::result::Result<String, AttemptError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
                AttemptError::Transient("API key is not a valid header value".to_string())
            })?,
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AttemptError::from_status(status.as_u16(), &body));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            AttemptError::Transient(format!("Failed to parse response: {}", e))
        })?;

        parsed
            .content()
            .map(str::to_string)
            .ok_or_else(|| AttemptError::Transient("Invalid response format from API".to_string()))
    }
}
