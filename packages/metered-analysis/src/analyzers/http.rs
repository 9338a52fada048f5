//! HTTP client for a JSON analysis service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RemoteAnalysisError;
use crate::traits::analyzer::RemoteAnalyzer;
use crate::types::analysis::AnalysisRequest;

/// Posts `{content, metadata}` to an analysis endpoint with bearer auth.
///
/// Status mapping: 429 and 402 are quota errors, a client timeout is a
/// timeout, an unparseable body is malformed, any other non-2xx is
/// unavailable.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    timeout: Duration,
}

impl HttpAnalyzer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteAnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteAnalysisError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: SecretString::from(api_key.into()),
            timeout,
        })
    }

    fn map_transport(&self, e: reqwest::Error) -> RemoteAnalysisError {
        if e.is_timeout() {
            RemoteAnalysisError::Timeout(self.timeout)
        } else {
            RemoteAnalysisError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteAnalyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, RemoteAnalysisError> {
        debug!(endpoint = %self.endpoint, chars = request.content.len(), "Posting analysis request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
            warn!(status = status.as_u16(), "Analysis quota exceeded");
            return Err(RemoteAnalysisError::QuotaExceeded);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteAnalysisError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body = resp.text().await.map_err(|e| self.map_transport(e))?;
        serde_json::from_str(&body)
            .map_err(|e| RemoteAnalysisError::MalformedResponse(format!("invalid JSON: {e}")))
    }
}
