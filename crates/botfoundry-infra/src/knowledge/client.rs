//! `KnowledgeClient` -- concrete [`KnowledgeStore`] implementation over
//! the knowledge service's HTTP API.
//!
//! The service is best-effort by contract: `cognify` fires and forgets,
//! and callers of `store`/`search` already tolerate failures. The API
//! token is wrapped in [`secrecy::SecretString`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use botfoundry_core::knowledge::KnowledgeStore;
use botfoundry_types::analysis::{DecisionRecord, Precedent, PrReviewDataPoint};
use botfoundry_types::error::RepositoryError;

#[derive(Debug, Deserialize)]
struct StoreResponse {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Precedent>,
}

/// HTTP client for the knowledge store service.
pub struct KnowledgeClient {
    client: reqwest::Client,
    api_token: SecretString,
    base_url: String,
}

impl KnowledgeClient {
    pub fn new(base_url: impl Into<String>, api_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
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

    async fn post_json<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Uuid, RepositoryError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .error_for_status()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let parsed: StoreResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("malformed store response: {e}")))?;
        Ok(parsed.id)
    }
}

#[async_trait]
impl KnowledgeStore for KnowledgeClient {
    async fn store(&self, decision: DecisionRecord) -> Result<Uuid, RepositoryError> {
        self.post_json("/v1/decisions", &decision).await
    }

    async fn store_data_point(&self, point: PrReviewDataPoint) -> Result<Uuid, RepositoryError> {
        self.post_json("/v1/data-points", &point).await
    }

    async fn cognify(&self) {
        // Fire-and-forget: the graph rebuild is the service's problem.
        let result = self
            .client
            .post(self.url("/v1/cognify"))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await;
        if let Err(err) = result {
            debug!("cognify request failed (best effort): {err}");
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Precedent>, RepositoryError> {
        let response = self
            .client
            .get(self.url("/v1/search"))
            .bearer_auth(self.api_token.expose_secret())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .error_for_status()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Query(format!("malformed search response: {e}")))?;
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let c = KnowledgeClient::new("https://knowledge.example", SecretString::from("sk-test"));
        assert_eq!(c.url("/v1/search"), "https://knowledge.example/v1/search");
    }

    #[test]
    fn test_search_response_parses() {
        let json = r#"{"results": [
            {"decision_id": "0198b1a0-0000-7000-8000-000000000000", "summary": "integration ECO -> PIPE approved", "confidence": 0.91}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].confidence > 0.9);
    }
}
