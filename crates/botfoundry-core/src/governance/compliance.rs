//! Five-category compliance scoring.
//!
//! Each category is derived independently from observable governance
//! state, so re-evaluation is deterministic and reproducible in tests.
//! The per-entity fraction weights Partial at 0.5 and the ecosystem view
//! averages domains with equal weight; both are documented assumptions
//! (see `botfoundry_types::governance::PARTIAL_WEIGHT`).

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use botfoundry_types::governance::{
    ComplianceCategory, ComplianceRecord, ComplianceScore, Domain, Integration, IntegrationStatus,
};
use botfoundry_types::review::{Review, ReviewStatus};

use super::registry::HUB_DOMAIN;

#[derive(Debug, Default)]
pub struct ComplianceTracker {
    records: HashMap<String, ComplianceRecord>,
}

impl ComplianceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh all-NotEvaluated record for a newly created entity.
    pub fn create_record(&mut self, entity_id: &str) -> ComplianceRecord {
        let record = ComplianceRecord::new(entity_id);
        self.records.insert(entity_id.to_string(), record.clone());
        record
    }

    pub fn record(&self, entity_id: &str) -> Option<&ComplianceRecord> {
        self.records.get(entity_id)
    }

    /// Re-score a domain from its current edges and their reviews.
    ///
    /// Category rules (over governed edges, i.e. everything except the
    /// pre-connected hub edges from registration):
    /// - Integration Standards: none: NotEvaluated; any reviewless
    ///   connected edge: NonCompliant; any pending: Partial; otherwise
    ///   Compliant.
    /// - Quality Metrics: over terminal governed edges -- none:
    ///   NotEvaluated; no rejections: Compliant; fewer rejections than
    ///   connections: Partial; otherwise NonCompliant.
    /// - Security Policy: any linked review carrying a critical-risk
    ///   override marker: NonCompliant; some reviewed terminal edge:
    ///   Compliant; otherwise NotEvaluated.
    /// - Data Governance: declared capabilities: Compliant, else Partial.
    /// - Review Process: over linked terminal reviews -- none: NotEvaluated;
    ///   every rejection/cancellation carries a rationale: Compliant,
    ///   else NonCompliant.
    pub fn evaluate_domain(
        &mut self,
        domain: &Domain,
        integrations: &HashMap<Uuid, Integration>,
        reviews: &HashMap<Uuid, Review>,
    ) -> ComplianceRecord {
        let edges: Vec<&Integration> = integrations
            .values()
            .filter(|i| i.source == domain.code || i.target == domain.code)
            .collect();
        // Edges subject to review: everything except the pre-connected
        // (reviewless) hub edges created at registration.
        let governed: Vec<&Integration> = edges
            .iter()
            .copied()
            .filter(|i| {
                (i.source != HUB_DOMAIN && i.target != HUB_DOMAIN) || i.review_id.is_some()
            })
            .collect();
        let linked_reviews: Vec<&Review> = edges
            .iter()
            .filter_map(|i| i.review_id)
            .filter_map(|id| reviews.get(&id))
            .collect();

        let integration_standards = if governed.is_empty() {
            ComplianceScore::NotEvaluated
        } else if governed
            .iter()
            .any(|i| i.status == IntegrationStatus::Connected && i.review_id.is_none())
        {
            ComplianceScore::NonCompliant
        } else if governed
            .iter()
            .any(|i| i.status == IntegrationStatus::Pending)
        {
            ComplianceScore::Partial
        } else {
            ComplianceScore::Compliant
        };

        let terminal: Vec<&&Integration> = governed
            .iter()
            .filter(|i| i.status.is_terminal())
            .collect();
        let rejected = terminal
            .iter()
            .filter(|i| i.status == IntegrationStatus::Rejected)
            .count();
        let connected = terminal
            .iter()
            .filter(|i| i.status == IntegrationStatus::Connected)
            .count();
        let quality_metrics = if terminal.is_empty() {
            ComplianceScore::NotEvaluated
        } else if rejected == 0 {
            ComplianceScore::Compliant
        } else if rejected < connected {
            ComplianceScore::Partial
        } else {
            ComplianceScore::NonCompliant
        };

        let security_policy = if linked_reviews.iter().any(|r| r.requires_override) {
            ComplianceScore::NonCompliant
        } else if linked_reviews.iter().any(|r| r.status.is_terminal()) {
            ComplianceScore::Compliant
        } else {
            ComplianceScore::NotEvaluated
        };

        let data_governance = if domain.capabilities.is_empty() {
            ComplianceScore::Partial
        } else {
            ComplianceScore::Compliant
        };

        let terminal_reviews: Vec<&&Review> =
            linked_reviews.iter().filter(|r| r.status.is_terminal()).collect();
        let review_process = if terminal_reviews.is_empty() {
            ComplianceScore::NotEvaluated
        } else if terminal_reviews.iter().all(|r| {
            r.status == ReviewStatus::Approved
                || r.rationale.as_ref().is_some_and(|s| !s.trim().is_empty())
        }) {
            ComplianceScore::Compliant
        } else {
            ComplianceScore::NonCompliant
        };

        self.store(
            &domain.code,
            [
                (ComplianceCategory::IntegrationStandards, integration_standards),
                (ComplianceCategory::QualityMetrics, quality_metrics),
                (ComplianceCategory::SecurityPolicy, security_policy),
                (ComplianceCategory::DataGovernance, data_governance),
                (ComplianceCategory::ReviewProcess, review_process),
            ],
        )
    }

    /// Re-score a single integration from its status and linked review.
    pub fn evaluate_integration(
        &mut self,
        integration: &Integration,
        review: Option<&Review>,
    ) -> ComplianceRecord {
        let integration_standards = match integration.status {
            IntegrationStatus::Connected => ComplianceScore::Compliant,
            IntegrationStatus::Pending => ComplianceScore::Partial,
            IntegrationStatus::Rejected => ComplianceScore::NonCompliant,
            IntegrationStatus::Cancelled => ComplianceScore::NotEvaluated,
        };

        let quality_metrics = match review {
            Some(r) if r.suggestions.is_empty() => ComplianceScore::Compliant,
            Some(_) => ComplianceScore::Partial,
            None => ComplianceScore::NotEvaluated,
        };

        let security_policy = match review {
            Some(r) if r.requires_override => ComplianceScore::NonCompliant,
            Some(r) if r.analysis_failed => ComplianceScore::NotEvaluated,
            Some(r) if r.status == ReviewStatus::Approved => ComplianceScore::Compliant,
            Some(_) => ComplianceScore::Partial,
            // Hub edges are pre-approved topology.
            None => ComplianceScore::Compliant,
        };

        let data_governance = if integration.pr_url.is_some() {
            ComplianceScore::Compliant
        } else {
            ComplianceScore::Partial
        };

        let review_process = match review {
            Some(r) if r.status.is_terminal() => ComplianceScore::Compliant,
            Some(r) if r.status == ReviewStatus::InReview => ComplianceScore::Partial,
            Some(_) => ComplianceScore::NotEvaluated,
            None => ComplianceScore::Compliant,
        };

        self.store(
            &integration.id.to_string(),
            [
                (ComplianceCategory::IntegrationStandards, integration_standards),
                (ComplianceCategory::QualityMetrics, quality_metrics),
                (ComplianceCategory::SecurityPolicy, security_policy),
                (ComplianceCategory::DataGovernance, data_governance),
                (ComplianceCategory::ReviewProcess, review_process),
            ],
        )
    }

    /// Equal-weight mean of per-domain compliance fractions, as a
    /// percentage in [0, 100]. Domains only; integration records are
    /// excluded from the ecosystem view.
    pub fn ecosystem_compliance<'a>(&self, domain_codes: impl Iterator<Item = &'a str>) -> f64 {
        let fractions: Vec<f64> = domain_codes
            .filter_map(|code| self.records.get(code))
            .map(ComplianceRecord::fraction)
            .collect();
        if fractions.is_empty() {
            return 0.0;
        }
        100.0 * fractions.iter().sum::<f64>() / fractions.len() as f64
    }

    fn store(
        &mut self,
        entity_id: &str,
        scores: [(ComplianceCategory, ComplianceScore); 5],
    ) -> ComplianceRecord {
        let record = ComplianceRecord {
            entity_id: entity_id.to_string(),
            scores: scores.into_iter().collect(),
            evaluated_at: Utc::now(),
        };
        self.records.insert(entity_id.to_string(), record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfoundry_types::governance::DomainStatus;
    use botfoundry_types::review::{ReviewPriority, ReviewType};

    fn domain(code: &str, capabilities: Vec<String>) -> Domain {
        Domain {
            code: code.to_string(),
            capabilities,
            status: DomainStatus::Active,
            connections: Vec::new(),
            created_at: Utc::now(),
            version: 1,
        }
    }

    fn edge(source: &str, status: IntegrationStatus, review_id: Option<Uuid>) -> Integration {
        Integration {
            id: Uuid::now_v7(),
            source: source.to_string(),
            target: HUB_DOMAIN.to_string(),
            status,
            review_id,
            pr_url: None,
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn fresh_record_is_fully_unevaluated() {
        let mut tracker = ComplianceTracker::new();
        let record = tracker.create_record("ECO");
        assert_eq!(record.scores.len(), 5);
        assert_eq!(record.fraction(), 0.0);
    }

    #[test]
    fn domain_with_no_reviewed_edges_scores_mostly_unevaluated() {
        let mut tracker = ComplianceTracker::new();
        let d = domain("ECO", vec!["sustainability".into()]);
        let record = tracker.evaluate_domain(&d, &HashMap::new(), &HashMap::new());

        assert_eq!(
            record.scores[&ComplianceCategory::IntegrationStandards],
            ComplianceScore::NotEvaluated
        );
        assert_eq!(
            record.scores[&ComplianceCategory::DataGovernance],
            ComplianceScore::Compliant
        );
    }

    #[test]
    fn pending_edge_makes_integration_standards_partial() {
        let mut tracker = ComplianceTracker::new();
        let d = domain("ECO", vec![]);
        let review = Review::new(ReviewType::Integration, ReviewPriority::Medium);
        let pending = edge("ECO", IntegrationStatus::Pending, Some(review.id));
        let integrations = HashMap::from([(pending.id, pending)]);
        let reviews = HashMap::from([(review.id, review)]);

        let record = tracker.evaluate_domain(&d, &integrations, &reviews);
        assert_eq!(
            record.scores[&ComplianceCategory::IntegrationStandards],
            ComplianceScore::Partial
        );
        // No capabilities declared.
        assert_eq!(
            record.scores[&ComplianceCategory::DataGovernance],
            ComplianceScore::Partial
        );
    }

    #[test]
    fn override_marker_taints_security_policy() {
        let mut tracker = ComplianceTracker::new();
        let d = domain("ECO", vec!["x".into()]);
        let mut review = Review::new(ReviewType::Integration, ReviewPriority::High);
        review.status = ReviewStatus::Rejected;
        review.rationale = Some("critical risk".into());
        review.requires_override = true;
        let rejected = edge("ECO", IntegrationStatus::Rejected, Some(review.id));
        let integrations = HashMap::from([(rejected.id, rejected)]);
        let reviews = HashMap::from([(review.id, review)]);

        let record = tracker.evaluate_domain(&d, &integrations, &reviews);
        assert_eq!(
            record.scores[&ComplianceCategory::SecurityPolicy],
            ComplianceScore::NonCompliant
        );
    }

    #[test]
    fn connected_integration_scores_compliant() {
        let mut tracker = ComplianceTracker::new();
        let mut review = Review::new(ReviewType::Integration, ReviewPriority::Medium);
        review.status = ReviewStatus::Approved;
        let mut e = edge("ECO", IntegrationStatus::Connected, Some(review.id));
        e.pr_url = Some("https://git/pr/9".into());

        let record = tracker.evaluate_integration(&e, Some(&review));
        assert_eq!(
            record.scores[&ComplianceCategory::IntegrationStandards],
            ComplianceScore::Compliant
        );
        assert_eq!(
            record.scores[&ComplianceCategory::SecurityPolicy],
            ComplianceScore::Compliant
        );
        assert_eq!(
            record.scores[&ComplianceCategory::DataGovernance],
            ComplianceScore::Compliant
        );
    }

    #[test]
    fn ecosystem_compliance_averages_domains_equally() {
        let mut tracker = ComplianceTracker::new();
        // ECO: 5/5 compliant; AXIS: untouched record at 0.
        let mut eco = ComplianceRecord::new("ECO");
        for c in ComplianceCategory::ALL {
            eco.scores.insert(c, ComplianceScore::Compliant);
        }
        tracker.records.insert("ECO".into(), eco);
        tracker.create_record("AXIS");

        let pct = tracker.ecosystem_compliance(["ECO", "AXIS"].into_iter());
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ecosystem_compliance_empty_is_zero() {
        let tracker = ComplianceTracker::new();
        assert_eq!(tracker.ecosystem_compliance(std::iter::empty()), 0.0);
    }
}
