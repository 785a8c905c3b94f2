//! `PrAnalysisClient` -- concrete [`PrAnalysisService`] implementation
//! over the analyzer's HTTP API.
//!
//! The service is slow and unreliable by contract: request timeouts and
//! 5xx responses surface as `AnalysisError::Transient` so the bot's
//! bounded backoff drives the retries. The API token is wrapped in
//! [`secrecy::SecretString`] and is never logged or included in `Debug`
//! output.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use botfoundry_core::review::PrAnalysisService;
use botfoundry_types::analysis::{AnalysisPoll, AnalysisReport};
use botfoundry_types::error::AnalysisError;

use super::types::{ResultResponse, SubmitRequest, SubmitResponse, XpResponse};

/// HTTP client for the PR analysis service.
pub struct PrAnalysisClient {
    client: reqwest::Client,
    api_token: SecretString,
    base_url: String,
}

impl PrAnalysisClient {
    /// Create a new client against the given service endpoint.
    pub fn new(base_url: impl Into<String>, api_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_token,
            base_url: base_url.into(),
        }
    }

    /// Override the base URL (useful for tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify(err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() || err.is_connect() {
            return AnalysisError::Transient(err.to_string());
        }
        AnalysisError::Rejected(err.to_string())
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> AnalysisError {
        if status.is_server_error() {
            AnalysisError::Transient(format!("{status}: {body}"))
        } else {
            AnalysisError::Rejected(format!("{status}: {body}"))
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AnalysisError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, body))
    }
}

// No Debug derive: the SecretString field already refuses to print, and
// omitting Debug entirely keeps the token out of error chains.

#[async_trait]
impl PrAnalysisService for PrAnalysisClient {
    async fn submit(&self, pr_url: &str) -> Result<Uuid, AnalysisError> {
        let response = self
            .client
            .post(self.url("/v1/analyses"))
            .bearer_auth(self.api_token.expose_secret())
            .json(&SubmitRequest { pr_url })
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check(response).await?;
        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transient(format!("malformed submit response: {e}")))?;
        Ok(parsed.analysis_id)
    }

    async fn fetch_result(&self, analysis_id: Uuid) -> Result<AnalysisPoll, AnalysisError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/analyses/{analysis_id}")))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(Self::classify)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AnalysisError::NotFound(analysis_id));
        }
        let response = Self::check(response).await?;
        let parsed: ResultResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transient(format!("malformed result response: {e}")))?;

        if parsed.status != "complete" {
            return Ok(AnalysisPoll::Pending);
        }
        let (Some(risk_level), Some(confidence)) = (parsed.risk_level, parsed.confidence) else {
            return Err(AnalysisError::Rejected(
                "complete analysis missing risk_level or confidence".to_string(),
            ));
        };
        Ok(AnalysisPoll::Ready(AnalysisReport {
            analysis_id,
            clusters: parsed.clusters,
            risk_level,
            suggestions: parsed.suggestions,
            confidence,
        }))
    }

    async fn export_markdown(&self, analysis_id: Uuid) -> Result<String, AnalysisError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/analyses/{analysis_id}/markdown")))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check(response).await?;
        response
            .text()
            .await
            .map_err(|e| AnalysisError::Transient(e.to_string()))
    }

    async fn fetch_xp(&self, review_id: Uuid) -> Result<i64, AnalysisError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/reviews/{review_id}/xp")))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check(response).await?;
        let parsed: XpResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Transient(format!("malformed xp response: {e}")))?;
        Ok(parsed.xp)
    }
}
