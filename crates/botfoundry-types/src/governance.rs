//! Domain, integration, and compliance types for the governance layer.
//!
//! Domains are spokes around a single hub; cross-domain traffic is modeled
//! as `Integration` edges whose terminal status is always driven by exactly
//! one linked `Review`. Compliance is scored across five fixed categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Domain lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Active,
    Suspended,
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainStatus::Active => write!(f, "active"),
            DomainStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// A registered domain: a spoke in the hub-and-spoke topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Short uppercase code, unique across the registry (e.g. "ECO").
    pub code: String,
    pub capabilities: Vec<String>,
    pub status: DomainStatus,
    /// Integration edges this domain participates in.
    pub connections: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every registry mutation touching this domain.
    pub version: u64,
}

/// Integration edge lifecycle.
///
/// Pending edges are waiting on their linked review; the three remaining
/// states are terminal and must always match the review's terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Pending,
    Connected,
    Rejected,
    Cancelled,
}

impl IntegrationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, IntegrationStatus::Pending)
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationStatus::Pending => write!(f, "pending"),
            IntegrationStatus::Connected => write!(f, "connected"),
            IntegrationStatus::Rejected => write!(f, "rejected"),
            IntegrationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A directed integration edge between two domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub source: String,
    pub target: String,
    pub status: IntegrationStatus,
    /// The review that owns this edge's terminal status. Hub edges created
    /// at registration are pre-connected and carry no review.
    pub review_id: Option<Uuid>,
    /// Pull request that motivated the request, when one exists.
    pub pr_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// The five fixed compliance scoring dimensions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCategory {
    IntegrationStandards,
    QualityMetrics,
    SecurityPolicy,
    DataGovernance,
    ReviewProcess,
}

impl ComplianceCategory {
    /// All five categories, in canonical order.
    pub const ALL: [ComplianceCategory; 5] = [
        ComplianceCategory::IntegrationStandards,
        ComplianceCategory::QualityMetrics,
        ComplianceCategory::SecurityPolicy,
        ComplianceCategory::DataGovernance,
        ComplianceCategory::ReviewProcess,
    ];
}

impl fmt::Display for ComplianceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplianceCategory::IntegrationStandards => "integration_standards",
            ComplianceCategory::QualityMetrics => "quality_metrics",
            ComplianceCategory::SecurityPolicy => "security_policy",
            ComplianceCategory::DataGovernance => "data_governance",
            ComplianceCategory::ReviewProcess => "review_process",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ComplianceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integration_standards" => Ok(ComplianceCategory::IntegrationStandards),
            "quality_metrics" => Ok(ComplianceCategory::QualityMetrics),
            "security_policy" => Ok(ComplianceCategory::SecurityPolicy),
            "data_governance" => Ok(ComplianceCategory::DataGovernance),
            "review_process" => Ok(ComplianceCategory::ReviewProcess),
            other => Err(format!("invalid compliance category: '{other}'")),
        }
    }
}

/// Per-category score values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceScore {
    Compliant,
    Partial,
    NonCompliant,
    NotEvaluated,
}

impl fmt::Display for ComplianceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplianceScore::Compliant => "compliant",
            ComplianceScore::Partial => "partial",
            ComplianceScore::NonCompliant => "non_compliant",
            ComplianceScore::NotEvaluated => "not_evaluated",
        };
        write!(f, "{s}")
    }
}

/// Weight a Partial score contributes toward the compliance fraction.
///
/// The upstream contract leaves the aggregate weighting unspecified; 0.5 is
/// an explicit assumption pending confirmation.
pub const PARTIAL_WEIGHT: f64 = 0.5;

/// Compliance scores for one entity (a domain code or an integration id).
///
/// Always holds exactly five entries, one per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub entity_id: String,
    pub scores: BTreeMap<ComplianceCategory, ComplianceScore>,
    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceRecord {
    /// Fresh record with every category NotEvaluated.
    pub fn new(entity_id: impl Into<String>) -> Self {
        let scores = ComplianceCategory::ALL
            .into_iter()
            .map(|c| (c, ComplianceScore::NotEvaluated))
            .collect();
        Self {
            entity_id: entity_id.into(),
            scores,
            evaluated_at: Utc::now(),
        }
    }

    /// Fraction in [0, 1]: (compliant + 0.5 * partial) / 5.
    pub fn fraction(&self) -> f64 {
        let compliant = self
            .scores
            .values()
            .filter(|s| **s == ComplianceScore::Compliant)
            .count() as f64;
        let partial = self
            .scores
            .values()
            .filter(|s| **s == ComplianceScore::Partial)
            .count() as f64;
        (compliant + PARTIAL_WEIGHT * partial) / ComplianceCategory::ALL.len() as f64
    }
}
