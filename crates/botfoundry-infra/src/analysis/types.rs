//! Wire types for the PR analysis service API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use botfoundry_types::analysis::RiskLevel;

#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub pr_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub analysis_id: Uuid,
}

/// Analysis status payload. `status` is "pending" until the analyzer
/// finishes; the remaining fields are only meaningful once "complete".
#[derive(Debug, Deserialize)]
pub struct ResultResponse {
    pub status: String,
    #[serde(default)]
    pub clusters: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct XpResponse {
    pub xp: i64,
}
