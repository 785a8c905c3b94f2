//! Types for the external PR analysis service and the knowledge store.
//!
//! Both services are external and non-deterministic; these types are the
//! narrow boundary the core consumes. Nothing here assumes reproducible
//! outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Risk classification returned by PR analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Moderate,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::None => write!(f, "none"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RiskLevel::None),
            "low" => Ok(RiskLevel::Low),
            "moderate" => Ok(RiskLevel::Moderate),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("invalid risk level: '{other}'")),
        }
    }
}

/// A completed analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    /// Change clusters the analyzer grouped the diff into.
    pub clusters: Vec<String>,
    pub risk_level: RiskLevel,
    pub suggestions: Vec<String>,
    /// Analyzer self-reported confidence in [0, 1].
    pub confidence: f64,
}

/// Poll result for an in-flight analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisPoll {
    /// Still running; poll again later.
    Pending,
    Ready(AnalysisReport),
}

/// One completed PR review, stored as precedent in the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrReviewDataPoint {
    pub pr_url: String,
    pub analysis_id: Uuid,
    pub risk_level: RiskLevel,
    pub clusters: Vec<String>,
    pub suggestions: Vec<String>,
    pub confidence: f64,
    /// XP the human reviewer earned, when the review was human-completed.
    pub reviewer_xp: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

/// A finalized governance decision, logged for precedent lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub review_id: Uuid,
    pub integration_id: Option<Uuid>,
    pub summary: String,
    pub outcome: String,
    pub rationale: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// A ranked precedent returned by knowledge search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Precedent {
    pub decision_id: Uuid,
    pub summary: String,
    /// Retrieval confidence in [0, 1]; ranking only, no semantics beyond
    /// "higher is a closer match".
    pub confidence: f64,
}
