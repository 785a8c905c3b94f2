//! Governance manager: the single-writer facade over the registry,
//! compliance tracker, and review pipeline.
//!
//! Every bot-facing mutation of governance state goes through this type;
//! nothing else touches the composed services. One async mutex over the
//! state serializes all writes, which is what makes review decisions and
//! integration activation race-free per entity. Finalized decisions are
//! logged to the knowledge store (best effort) and all records are written
//! through the persistence port.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use botfoundry_types::analysis::{DecisionRecord, Precedent};
use botfoundry_types::error::GovernanceError;
use botfoundry_types::event::{BusEvent, EventKind};
use botfoundry_types::governance::{ComplianceRecord, Domain, Integration, IntegrationStatus};
use botfoundry_types::review::{
    ApprovalPolicy, Review, ReviewPriority, ReviewStatus, ReviewType, Verdict,
};

use crate::event::EventBus;
use crate::knowledge::KnowledgeStore;

use super::compliance::ComplianceTracker;
use super::pipeline::{DecisionEffect, ReviewPipeline};
use super::registry::DomainRegistry;
use super::repo::GovernanceRepo;

/// Everything a caller learns about a domain in one call.
#[derive(Debug, Clone)]
pub struct DomainInfo {
    pub domain: Domain,
    pub integrations: Vec<Integration>,
    pub compliance: Option<ComplianceRecord>,
}

/// Result of a successful integration request.
#[derive(Debug, Clone)]
pub struct IntegrationTicket {
    pub integration: Integration,
    pub review: Review,
    /// Similar past decisions, most confident first. Best effort: empty
    /// when the knowledge store is unavailable.
    pub precedents: Vec<Precedent>,
}

struct State {
    registry: DomainRegistry,
    compliance: ComplianceTracker,
    pipeline: ReviewPipeline,
}

pub struct GovernanceManager {
    inner: Mutex<State>,
    bus: Arc<EventBus>,
    knowledge: Arc<dyn KnowledgeStore>,
    repo: Arc<dyn GovernanceRepo>,
    policy: ApprovalPolicy,
}

impl GovernanceManager {
    pub fn new(
        bus: Arc<EventBus>,
        knowledge: Arc<dyn KnowledgeStore>,
        repo: Arc<dyn GovernanceRepo>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            inner: Mutex::new(State {
                registry: DomainRegistry::new(),
                compliance: ComplianceTracker::new(),
                pipeline: ReviewPipeline::new(),
            }),
            bus,
            knowledge,
            repo,
            policy,
        }
    }

    /// Load persisted governance records into the in-memory services.
    /// Call once at startup, before any bot runs.
    pub async fn hydrate(&self) -> Result<(), GovernanceError> {
        let domains = self.repo.load_domains().await?;
        let integrations = self.repo.load_integrations().await?;
        let reviews = self.repo.load_reviews().await?;

        let mut state = self.inner.lock().await;
        for domain in domains {
            state.compliance.create_record(&domain.code);
            state.registry.insert_domain(domain);
        }
        for integration in integrations {
            state.registry.insert_integration(integration);
        }
        for review in reviews {
            state.pipeline.insert(review);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Domains
    // -----------------------------------------------------------------

    /// Register a domain: Active, a fresh all-NotEvaluated compliance
    /// record, and a pre-connected edge to the hub.
    pub async fn register_domain(
        &self,
        code: &str,
        capabilities: Vec<String>,
    ) -> Result<DomainInfo, GovernanceError> {
        let mut state = self.inner.lock().await;
        let (domain, hub_edge) = state.registry.register_domain(code, capabilities)?;
        let compliance = state.compliance.create_record(code);

        self.repo.save_domain(&domain).await?;
        if let Some(edge) = &hub_edge {
            self.repo.save_integration(edge).await?;
        }
        self.bus.publish(BusEvent::new(
            EventKind::DomainRegistered,
            None,
            serde_json::json!({"code": code, "hub_edge": hub_edge.as_ref().map(|e| e.id)}),
        ));

        Ok(DomainInfo {
            integrations: hub_edge.into_iter().collect(),
            domain,
            compliance: Some(compliance),
        })
    }

    pub async fn get_domain_info(&self, code: &str) -> Result<DomainInfo, GovernanceError> {
        let state = self.inner.lock().await;
        let domain = state.registry.domain(code)?.clone();
        let integrations = state
            .registry
            .integrations_for(code)
            .into_iter()
            .cloned()
            .collect();
        let compliance = state.compliance.record(code).cloned();
        Ok(DomainInfo {
            domain,
            integrations,
            compliance,
        })
    }

    /// Allow a direct connection between two non-hub domains.
    pub async fn add_exception(&self, a: &str, b: &str) {
        self.inner.lock().await.registry.add_exception(a, b);
    }

    pub async fn suspend_domain(&self, code: &str) -> Result<Domain, GovernanceError> {
        let mut state = self.inner.lock().await;
        let domain = state.registry.suspend_domain(code)?;
        self.repo.save_domain(&domain).await?;
        Ok(domain)
    }

    pub async fn resume_domain(&self, code: &str) -> Result<Domain, GovernanceError> {
        let mut state = self.inner.lock().await;
        let domain = state.registry.resume_domain(code)?;
        self.repo.save_domain(&domain).await?;
        Ok(domain)
    }

    // -----------------------------------------------------------------
    // Integration requests
    // -----------------------------------------------------------------

    /// Request a cross-domain integration.
    ///
    /// The hub-and-spoke policy check runs first: a violating pair fails
    /// here and neither a Review nor an Integration is created. On
    /// success the linked pair (Review pending, Integration pending) is
    /// created atomically under the state lock, and similar past
    /// decisions are surfaced from the knowledge store.
    pub async fn request_integration(
        &self,
        source: &str,
        target: &str,
        pr_url: Option<String>,
        priority: ReviewPriority,
    ) -> Result<IntegrationTicket, GovernanceError> {
        let (integration, review) = {
            let mut state = self.inner.lock().await;
            state.registry.policy_check(source, target)?;

            let review = state
                .pipeline
                .create_review(ReviewType::Integration, priority);
            let integration = state.registry.create_pending_integration(
                source,
                target,
                pr_url,
                review.id,
            )?;
            state.pipeline.link_integration(review.id, integration.id)?;
            let review = state.pipeline.review(review.id)?.clone();
            (integration, review)
        };

        self.repo.save_integration(&integration).await?;
        self.repo.save_review(&review).await?;

        self.bus.publish(BusEvent::new(
            EventKind::IntegrationRequested,
            None,
            serde_json::json!({
                "integration_id": integration.id,
                "review_id": review.id,
                "source": source,
                "target": target,
            }),
        ));
        self.bus.publish(BusEvent::new(
            EventKind::ReviewCreated,
            None,
            serde_json::json!({"review_id": review.id, "type": review.review_type}),
        ));

        let precedents = match self
            .knowledge
            .search(&format!("integration {source} {target}"))
            .await
        {
            Ok(found) => found,
            Err(err) => {
                warn!("precedent lookup failed: {err}");
                Vec::new()
            }
        };

        Ok(IntegrationTicket {
            integration,
            review,
            precedents,
        })
    }

    // -----------------------------------------------------------------
    // Reviews
    // -----------------------------------------------------------------

    /// Create a standalone review (security, quality, ...). Integration
    /// reviews come from `request_integration`.
    pub async fn create_review(
        &self,
        review_type: ReviewType,
        priority: ReviewPriority,
    ) -> Result<Review, GovernanceError> {
        let review = {
            let mut state = self.inner.lock().await;
            state.pipeline.create_review(review_type, priority)
        };
        self.repo.save_review(&review).await?;
        self.bus.publish(BusEvent::new(
            EventKind::ReviewCreated,
            None,
            serde_json::json!({"review_id": review.id, "type": review.review_type}),
        ));
        Ok(review)
    }

    pub async fn assign_reviewers(
        &self,
        review_id: Uuid,
        reviewers: Vec<String>,
    ) -> Result<Review, GovernanceError> {
        let (review, newly_assigned) = {
            let mut state = self.inner.lock().await;
            let newly = state.pipeline.assign_reviewers(review_id, reviewers)?;
            (state.pipeline.review(review_id)?.clone(), newly)
        };
        if newly_assigned {
            self.repo.save_review(&review).await?;
            self.bus.publish(BusEvent::new(
                EventKind::ReviewersAssigned,
                None,
                serde_json::json!({"review_id": review_id, "reviewers": review.reviewers}),
            ));
        }
        Ok(review)
    }

    pub async fn attach_suggestions(
        &self,
        review_id: Uuid,
        suggestions: Vec<String>,
    ) -> Result<Review, GovernanceError> {
        let review = {
            let mut state = self.inner.lock().await;
            state.pipeline.attach_suggestions(review_id, suggestions)?;
            state.pipeline.review(review_id)?.clone()
        };
        self.repo.save_review(&review).await?;
        Ok(review)
    }

    /// Record one reviewer's verdict under the configured approval
    /// policy. Reaching a terminal state synchronizes the linked
    /// integration in the same critical section.
    pub async fn submit_decision(
        &self,
        review_id: Uuid,
        reviewer: &str,
        verdict: Verdict,
        rationale: Option<&str>,
    ) -> Result<Review, GovernanceError> {
        let mut state = self.inner.lock().await;
        let effect =
            state
                .pipeline
                .submit_decision(review_id, reviewer, verdict, rationale, self.policy)?;
        match effect {
            DecisionEffect::Pending => {
                let review = state.pipeline.review(review_id)?.clone();
                drop(state);
                self.repo.save_review(&review).await?;
                Ok(review)
            }
            DecisionEffect::Finalized(status) => {
                self.finalize_linked(state, review_id, status).await
            }
            DecisionEffect::NoOp => Ok(state.pipeline.review(review_id)?.clone()),
        }
    }

    /// Approve the review driving `integration_id`. Idempotent: calling
    /// it on an already-approved review changes nothing and emits no
    /// events.
    pub async fn approve_integration(
        &self,
        integration_id: Uuid,
        rationale: Option<String>,
    ) -> Result<Review, GovernanceError> {
        let mut state = self.inner.lock().await;
        let review_id = self.linked_review(&state, integration_id)?;
        match state.pipeline.force_approve(review_id, rationale)? {
            DecisionEffect::NoOp => {
                debug!(review = %review_id, "already approved, no-op");
                Ok(state.pipeline.review(review_id)?.clone())
            }
            _ => self.finalize_linked(state, review_id, ReviewStatus::Approved).await,
        }
    }

    /// Reject the review driving `integration_id`. The rationale is
    /// mandatory; `requires_override` marks automated critical-risk
    /// rejections that only a fresh human-initiated review can overturn.
    pub async fn reject_integration(
        &self,
        integration_id: Uuid,
        rationale: &str,
        requires_override: bool,
    ) -> Result<Review, GovernanceError> {
        let mut state = self.inner.lock().await;
        let review_id = self.linked_review(&state, integration_id)?;
        match state
            .pipeline
            .force_reject(review_id, rationale, requires_override)?
        {
            DecisionEffect::NoOp => Ok(state.pipeline.review(review_id)?.clone()),
            _ => self.finalize_linked(state, review_id, ReviewStatus::Rejected).await,
        }
    }

    /// Cancel a review (e.g. the PR was closed). The linked integration
    /// ends Cancelled, never stuck Pending.
    pub async fn cancel_review(
        &self,
        review_id: Uuid,
        rationale: &str,
    ) -> Result<Review, GovernanceError> {
        let mut state = self.inner.lock().await;
        match state.pipeline.cancel(review_id, rationale)? {
            DecisionEffect::NoOp => Ok(state.pipeline.review(review_id)?.clone()),
            _ => self.finalize_linked(state, review_id, ReviewStatus::Cancelled).await,
        }
    }

    /// External analysis exhausted its retries: flag the review and force
    /// it into the human queue. Never silently auto-approves.
    pub async fn mark_analysis_failed(
        &self,
        review_id: Uuid,
        fallback_reviewers: Vec<String>,
    ) -> Result<Review, GovernanceError> {
        let review = {
            let mut state = self.inner.lock().await;
            state.pipeline.mark_analysis_failed(review_id)?;
            if !fallback_reviewers.is_empty() {
                let _ = state.pipeline.assign_reviewers(review_id, fallback_reviewers)?;
            }
            state.pipeline.review(review_id)?.clone()
        };
        self.repo.save_review(&review).await?;
        self.bus.publish(BusEvent::new(
            EventKind::AnalysisFailed,
            None,
            serde_json::json!({"review_id": review_id}),
        ));
        Ok(review)
    }

    /// Audited reset out of a terminal state. The linked integration
    /// returns to Pending so the pair stays matched.
    pub async fn reset_review(
        &self,
        review_id: Uuid,
        rationale: &str,
    ) -> Result<Review, GovernanceError> {
        let (review, integration) = {
            let mut state = self.inner.lock().await;
            let review = state.pipeline.reset(review_id, rationale)?;
            let integration = match review.integration_id {
                Some(id) => Some(
                    state
                        .registry
                        .set_integration_status(id, IntegrationStatus::Pending)?,
                ),
                None => None,
            };
            (review, integration)
        };
        self.repo.save_review(&review).await?;
        if let Some(integration) = &integration {
            self.repo.save_integration(integration).await?;
        }
        Ok(review)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub async fn review(&self, id: Uuid) -> Result<Review, GovernanceError> {
        Ok(self.inner.lock().await.pipeline.review(id)?.clone())
    }

    pub async fn integration(&self, id: Uuid) -> Result<Integration, GovernanceError> {
        Ok(self.inner.lock().await.registry.integration(id)?.clone())
    }

    /// Pending integration reviews that carry a PR url -- the PR review
    /// bot's work queue.
    pub async fn pending_pr_reviews(&self) -> Vec<(Review, Integration)> {
        let state = self.inner.lock().await;
        state
            .pipeline
            .reviews()
            .values()
            .filter(|r| r.review_type == ReviewType::Integration)
            .filter(|r| !r.status.is_terminal() && !r.analysis_failed)
            .filter_map(|r| {
                let integration = r
                    .integration_id
                    .and_then(|id| state.registry.integration(id).ok())?;
                integration.pr_url.as_ref()?;
                Some((r.clone(), integration.clone()))
            })
            .collect()
    }

    /// Terminal reviews that collected at least one human verdict --
    /// the XP crediting queue.
    pub async fn finalized_human_reviews(&self) -> Vec<Review> {
        let state = self.inner.lock().await;
        state
            .pipeline
            .reviews()
            .values()
            .filter(|r| r.status.is_terminal() && !r.decisions.is_empty())
            .cloned()
            .collect()
    }

    /// Re-evaluate a domain's compliance record and publish the result.
    pub async fn evaluate_domain_compliance(
        &self,
        code: &str,
    ) -> Result<ComplianceRecord, GovernanceError> {
        let record = {
            let mut state = self.inner.lock().await;
            let domain = state.registry.domain(code)?.clone();
            let integrations = state.registry.integrations().clone();
            let reviews = state.pipeline.reviews().clone();
            state
                .compliance
                .evaluate_domain(&domain, &integrations, &reviews)
        };
        self.bus.publish(BusEvent::new(
            EventKind::ComplianceEvaluated,
            None,
            serde_json::json!({"entity_id": code, "fraction": record.fraction()}),
        ));
        Ok(record)
    }

    /// Ecosystem-wide compliance percentage: equal-weight mean over
    /// domain fractions.
    pub async fn ecosystem_compliance(&self) -> f64 {
        let state = self.inner.lock().await;
        let codes: Vec<String> = state.registry.domains().map(|d| d.code.clone()).collect();
        state
            .compliance
            .ecosystem_compliance(codes.iter().map(String::as_str))
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn linked_review(
        &self,
        state: &State,
        integration_id: Uuid,
    ) -> Result<Uuid, GovernanceError> {
        state
            .registry
            .integration(integration_id)?
            .review_id
            .ok_or(GovernanceError::ReviewNotFound(integration_id))
    }

    /// Joint finalization: the review just reached `status`; flip the
    /// linked integration to match, re-score compliance for both sides,
    /// persist, publish, and log the decision as precedent. Runs while
    /// still holding the state lock so the pair can never be observed
    /// half-updated by another writer.
    async fn finalize_linked(
        &self,
        mut state: tokio::sync::MutexGuard<'_, State>,
        review_id: Uuid,
        status: ReviewStatus,
    ) -> Result<Review, GovernanceError> {
        let review = state.pipeline.review(review_id)?.clone();

        let integration = match review.integration_id {
            Some(integration_id) => {
                let target = match status {
                    ReviewStatus::Approved => IntegrationStatus::Connected,
                    ReviewStatus::Rejected => IntegrationStatus::Rejected,
                    ReviewStatus::Cancelled => IntegrationStatus::Cancelled,
                    other => {
                        return Err(GovernanceError::InvalidTransition {
                            from: "pending".to_string(),
                            to: other.to_string(),
                        });
                    }
                };
                let integration = state.registry.set_integration_status(integration_id, target)?;
                state
                    .compliance
                    .evaluate_integration(&integration, Some(&review));
                for code in [integration.source.clone(), integration.target.clone()] {
                    let Ok(domain) = state.registry.domain(&code).map(Domain::clone) else {
                        continue;
                    };
                    let integrations = state.registry.integrations().clone();
                    let reviews = state.pipeline.reviews().clone();
                    state
                        .compliance
                        .evaluate_domain(&domain, &integrations, &reviews);
                }
                Some(integration)
            }
            None => None,
        };
        drop(state);

        self.repo.save_review(&review).await?;
        if let Some(integration) = &integration {
            self.repo.save_integration(integration).await?;
        }

        let kind = match status {
            ReviewStatus::Approved => EventKind::IntegrationApproved,
            ReviewStatus::Rejected => EventKind::IntegrationRejected,
            _ => EventKind::IntegrationCancelled,
        };
        if let Some(integration) = &integration {
            self.bus.publish(BusEvent::new(
                kind,
                None,
                serde_json::json!({
                    "integration_id": integration.id,
                    "review_id": review.id,
                    "source": integration.source,
                    "target": integration.target,
                }),
            ));
        }
        if status == ReviewStatus::Cancelled {
            self.bus.publish(BusEvent::new(
                EventKind::ReviewCancelled,
                None,
                serde_json::json!({"review_id": review.id}),
            ));
        }

        // Precedent logging is best effort: a knowledge-store failure
        // never blocks or reverts the decision.
        let summary = match &integration {
            Some(i) => format!("integration {} -> {} {}", i.source, i.target, status),
            None => format!("{} review {}", review.review_type, status),
        };
        let decision = DecisionRecord {
            review_id: review.id,
            integration_id: review.integration_id,
            summary,
            outcome: status.to_string(),
            rationale: review.rationale.clone(),
            decided_at: review.updated_at,
        };
        let knowledge = self.knowledge.clone();
        tokio::spawn(async move {
            if let Err(err) = knowledge.store(decision).await {
                warn!("failed to log decision precedent: {err}");
            }
            knowledge.cognify().await;
        });

        Ok(review)
    }
}
