//! Review workflow types.
//!
//! A `Review` is one approval-workflow instance: reviewers, collected
//! verdicts, and a final decision with rationale. Status transitions are
//! monotonic; the only path out of a terminal state is an audited reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What a review is reviewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Integration,
    Security,
    Quality,
    Architecture,
    Compliance,
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewType::Integration => write!(f, "integration"),
            ReviewType::Security => write!(f, "security"),
            ReviewType::Quality => write!(f, "quality"),
            ReviewType::Architecture => write!(f, "architecture"),
            ReviewType::Compliance => write!(f, "compliance"),
        }
    }
}

/// Review urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ReviewPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewPriority::Low => write!(f, "low"),
            ReviewPriority::Medium => write!(f, "medium"),
            ReviewPriority::High => write!(f, "high"),
            ReviewPriority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for ReviewPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ReviewPriority::Low),
            "medium" => Ok(ReviewPriority::Medium),
            "high" => Ok(ReviewPriority::High),
            "critical" => Ok(ReviewPriority::Critical),
            other => Err(format!("invalid review priority: '{other}'")),
        }
    }
}

/// Review workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Cancelled,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReviewStatus::Approved | ReviewStatus::Rejected | ReviewStatus::Cancelled
        )
    }

    /// Monotonic transition check. Terminal states admit no successor;
    /// leaving one requires the audited reset operation, which is modeled
    /// outside this check on purpose.
    pub fn can_transition_to(self, next: ReviewStatus) -> bool {
        use ReviewStatus::*;
        match self {
            Pending => matches!(next, InReview | Approved | Rejected | Cancelled),
            InReview => matches!(next, Approved | Rejected | Cancelled),
            Approved | Rejected | Cancelled => false,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A single reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

/// How many verdicts finalize a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    /// Every assigned reviewer must approve; any rejection finalizes.
    Unanimous,
    /// One verdict finalizes critical-priority reviews; lower priorities
    /// still require unanimity.
    SingleCritical,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        ApprovalPolicy::Unanimous
    }
}

/// One approval-workflow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub review_type: ReviewType,
    pub priority: ReviewPriority,
    pub status: ReviewStatus,
    pub reviewers: Vec<String>,
    /// Verdicts collected so far, keyed by reviewer.
    pub decisions: BTreeMap<String, Verdict>,
    /// Final decision rationale. Mandatory and non-empty on rejection,
    /// cancellation, and audited reset.
    pub rationale: Option<String>,
    /// The integration whose terminal status this review drives (1:1).
    pub integration_id: Option<Uuid>,
    /// Analyzer suggestions attached for the human reviewer queue.
    pub suggestions: Vec<String>,
    /// Set when external analysis was exhausted; forces human review.
    pub analysis_failed: bool,
    /// Set by an automated critical rejection; approval after this point
    /// requires a fresh human-initiated review.
    pub requires_override: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Review {
    pub fn new(review_type: ReviewType, priority: ReviewPriority) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            review_type,
            priority,
            status: ReviewStatus::Pending,
            reviewers: Vec::new(),
            decisions: BTreeMap::new(),
            rationale: None,
            integration_id: None,
            suggestions: Vec::new(),
            analysis_failed: false,
            requires_override: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Stamp a mutation: bump the version and refresh `updated_at`.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_review_starts_pending() {
        let review = Review::new(ReviewType::Integration, ReviewPriority::High);
        assert_eq!(review.status, ReviewStatus::Pending);
        assert!(review.decisions.is_empty());
        assert!(!review.analysis_failed);
    }

    #[test]
    fn test_terminal_states_admit_no_successor() {
        use ReviewStatus::*;
        for terminal in [Approved, Rejected, Cancelled] {
            for next in [Pending, InReview, Approved, Rejected, Cancelled] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_pending_can_cancel_or_decide() {
        use ReviewStatus::*;
        assert!(Pending.can_transition_to(InReview));
        assert!(Pending.can_transition_to(Cancelled));
        // auto-decisions skip the assignment step
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
    }

    #[test]
    fn test_in_review_cannot_return_to_pending() {
        assert!(!ReviewStatus::InReview.can_transition_to(ReviewStatus::Pending));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ReviewPriority::Critical > ReviewPriority::High);
        assert!(ReviewPriority::High > ReviewPriority::Medium);
        assert!(ReviewPriority::Medium > ReviewPriority::Low);
    }

    #[test]
    fn test_priority_string_roundtrip() {
        for p in [
            ReviewPriority::Low,
            ReviewPriority::Medium,
            ReviewPriority::High,
            ReviewPriority::Critical,
        ] {
            let parsed: ReviewPriority = p.to_string().parse().unwrap();
            assert_eq!(p, parsed);
        }
    }

    #[test]
    fn test_approval_policy_serde() {
        let json = serde_json::to_string(&ApprovalPolicy::SingleCritical).unwrap();
        assert_eq!(json, "\"single-critical\"");
        let parsed: ApprovalPolicy = serde_json::from_str("\"unanimous\"").unwrap();
        assert_eq!(parsed, ApprovalPolicy::Unanimous);
    }
}
