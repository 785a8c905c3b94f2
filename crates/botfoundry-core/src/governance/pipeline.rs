//! Approval-workflow state machine.
//!
//! Pending -> (assign_reviewers) -> InReview -> (submit_decision xN, per
//! policy) -> {Approved, Rejected}; Cancelled reachable from Pending and
//! InReview. Transitions are monotonic; the audited `reset` operation is
//! the single path out of a terminal state. All mutation happens under
//! the governance manager's single-writer lock, which is what serializes
//! concurrent `submit_decision` calls per review id.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use botfoundry_types::error::GovernanceError;
use botfoundry_types::review::{
    ApprovalPolicy, Review, ReviewPriority, ReviewStatus, ReviewType, Verdict,
};

/// Result of an operation that may (or may not) finalize a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionEffect {
    /// More verdicts are still required.
    Pending,
    /// The review just reached this terminal state; linked entities must
    /// be synchronized.
    Finalized(ReviewStatus),
    /// The review was already in the requested terminal state; nothing
    /// changed and no events should be emitted.
    NoOp,
}

/// Audit entry for a terminal-state reset.
#[derive(Debug, Clone)]
pub struct ResetAudit {
    pub review_id: Uuid,
    pub previous_status: ReviewStatus,
    pub rationale: String,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ReviewPipeline {
    reviews: HashMap<Uuid, Review>,
    reset_log: Vec<ResetAudit>,
}

impl ReviewPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_review(&mut self, review_type: ReviewType, priority: ReviewPriority) -> Review {
        let review = Review::new(review_type, priority);
        self.reviews.insert(review.id, review.clone());
        review
    }

    pub fn review(&self, id: Uuid) -> Result<&Review, GovernanceError> {
        self.reviews.get(&id).ok_or(GovernanceError::ReviewNotFound(id))
    }

    pub fn reviews(&self) -> &HashMap<Uuid, Review> {
        &self.reviews
    }

    /// Hydration from persisted records.
    pub fn insert(&mut self, review: Review) {
        self.reviews.insert(review.id, review);
    }

    pub fn link_integration(&mut self, review_id: Uuid, integration_id: Uuid) -> Result<(), GovernanceError> {
        let review = self.review_mut(review_id)?;
        review.integration_id = Some(integration_id);
        review.touch();
        Ok(())
    }

    /// Pending -> InReview with the given reviewer set. Idempotent once
    /// InReview: repeated assignment changes nothing and reports `false`.
    pub fn assign_reviewers(
        &mut self,
        id: Uuid,
        reviewers: Vec<String>,
    ) -> Result<bool, GovernanceError> {
        let review = self.review_mut(id)?;
        match review.status {
            ReviewStatus::Pending => {
                review.reviewers = reviewers;
                review.status = ReviewStatus::InReview;
                review.touch();
                Ok(true)
            }
            ReviewStatus::InReview => {
                debug!(review = %id, "reviewers already assigned");
                Ok(false)
            }
            terminal => Err(GovernanceError::InvalidTransition {
                from: terminal.to_string(),
                to: ReviewStatus::InReview.to_string(),
            }),
        }
    }

    pub fn attach_suggestions(
        &mut self,
        id: Uuid,
        suggestions: Vec<String>,
    ) -> Result<(), GovernanceError> {
        let review = self.review_mut(id)?;
        review.suggestions = suggestions;
        review.touch();
        Ok(())
    }

    /// Record one reviewer's verdict and apply the approval policy.
    ///
    /// Requires InReview status and an assigned reviewer. Rejection
    /// verdicts demand a non-empty rationale. Re-submitting replaces the
    /// reviewer's earlier verdict.
    pub fn submit_decision(
        &mut self,
        id: Uuid,
        reviewer: &str,
        verdict: Verdict,
        rationale: Option<&str>,
        policy: ApprovalPolicy,
    ) -> Result<DecisionEffect, GovernanceError> {
        let review = self.review_mut(id)?;
        match review.status {
            ReviewStatus::InReview => {}
            other => {
                return Err(GovernanceError::InvalidTransition {
                    from: other.to_string(),
                    to: "decided".to_string(),
                });
            }
        }
        if !review.reviewers.iter().any(|r| r == reviewer) {
            return Err(GovernanceError::NotAssigned(reviewer.to_string()));
        }
        if verdict == Verdict::Reject && !has_content(rationale) {
            return Err(GovernanceError::MissingRationale);
        }

        review.decisions.insert(reviewer.to_string(), verdict);
        review.touch();

        let single_verdict_decides = policy == ApprovalPolicy::SingleCritical
            && review.priority == ReviewPriority::Critical;
        let any_reject = review.decisions.values().any(|v| *v == Verdict::Reject);
        let all_in = review.decisions.len() == review.reviewers.len();

        let terminal = if single_verdict_decides {
            Some(match verdict {
                Verdict::Approve => ReviewStatus::Approved,
                Verdict::Reject => ReviewStatus::Rejected,
            })
        } else if any_reject {
            Some(ReviewStatus::Rejected)
        } else if all_in {
            Some(ReviewStatus::Approved)
        } else {
            None
        };

        match terminal {
            Some(status) => {
                Self::finalize(review, status, rationale.map(str::to_string))?;
                Ok(DecisionEffect::Finalized(status))
            }
            None => Ok(DecisionEffect::Pending),
        }
    }

    /// Direct approval (auto-approve path). No-op when already Approved.
    pub fn force_approve(
        &mut self,
        id: Uuid,
        rationale: Option<String>,
    ) -> Result<DecisionEffect, GovernanceError> {
        let review = self.review_mut(id)?;
        if review.status == ReviewStatus::Approved {
            return Ok(DecisionEffect::NoOp);
        }
        Self::finalize(review, ReviewStatus::Approved, rationale)?;
        Ok(DecisionEffect::Finalized(ReviewStatus::Approved))
    }

    /// Direct rejection (auto-reject path). Requires a non-empty
    /// rationale; `requires_override` marks critical-risk rejections that
    /// only a fresh human-initiated review may overturn.
    pub fn force_reject(
        &mut self,
        id: Uuid,
        rationale: &str,
        requires_override: bool,
    ) -> Result<DecisionEffect, GovernanceError> {
        if !has_content(Some(rationale)) {
            return Err(GovernanceError::MissingRationale);
        }
        let review = self.review_mut(id)?;
        if review.status == ReviewStatus::Rejected {
            return Ok(DecisionEffect::NoOp);
        }
        Self::finalize(review, ReviewStatus::Rejected, Some(rationale.to_string()))?;
        review.requires_override = requires_override;
        Ok(DecisionEffect::Finalized(ReviewStatus::Rejected))
    }

    /// Cancel from Pending or InReview (e.g. the PR was closed).
    pub fn cancel(&mut self, id: Uuid, rationale: &str) -> Result<DecisionEffect, GovernanceError> {
        if !has_content(Some(rationale)) {
            return Err(GovernanceError::MissingRationale);
        }
        let review = self.review_mut(id)?;
        if review.status == ReviewStatus::Cancelled {
            return Ok(DecisionEffect::NoOp);
        }
        Self::finalize(review, ReviewStatus::Cancelled, Some(rationale.to_string()))?;
        Ok(DecisionEffect::Finalized(ReviewStatus::Cancelled))
    }

    /// Flag the review as having lost its external analysis. The review
    /// stays open; the manager routes it to mandatory human review.
    pub fn mark_analysis_failed(&mut self, id: Uuid) -> Result<Review, GovernanceError> {
        let review = self.review_mut(id)?;
        if review.status.is_terminal() {
            return Err(GovernanceError::InvalidTransition {
                from: review.status.to_string(),
                to: "analysis_failed".to_string(),
            });
        }
        review.analysis_failed = true;
        review.touch();
        Ok(review.clone())
    }

    /// Audited reset: the only path out of a terminal state. Clears
    /// collected verdicts and returns the review to Pending; the reset is
    /// recorded with its mandatory rationale.
    pub fn reset(&mut self, id: Uuid, rationale: &str) -> Result<Review, GovernanceError> {
        if !has_content(Some(rationale)) {
            return Err(GovernanceError::MissingRationale);
        }
        let review = self.review_mut(id)?;
        if !review.status.is_terminal() {
            return Err(GovernanceError::InvalidTransition {
                from: review.status.to_string(),
                to: ReviewStatus::Pending.to_string(),
            });
        }
        let previous = review.status;
        review.status = ReviewStatus::Pending;
        review.decisions.clear();
        review.reviewers.clear();
        review.rationale = None;
        review.requires_override = false;
        review.analysis_failed = false;
        review.touch();
        let audited = review.clone();
        self.reset_log.push(ResetAudit {
            review_id: id,
            previous_status: previous,
            rationale: rationale.to_string(),
            reset_at: Utc::now(),
        });
        Ok(audited)
    }

    pub fn reset_log(&self) -> &[ResetAudit] {
        &self.reset_log
    }

    fn review_mut(&mut self, id: Uuid) -> Result<&mut Review, GovernanceError> {
        self.reviews.get_mut(&id).ok_or(GovernanceError::ReviewNotFound(id))
    }

    fn finalize(
        review: &mut Review,
        status: ReviewStatus,
        rationale: Option<String>,
    ) -> Result<(), GovernanceError> {
        if !review.status.can_transition_to(status) {
            return Err(GovernanceError::InvalidTransition {
                from: review.status.to_string(),
                to: status.to_string(),
            });
        }
        review.status = status;
        if rationale.is_some() {
            review.rationale = rationale;
        }
        review.touch();
        Ok(())
    }
}

fn has_content(text: Option<&str>) -> bool {
    text.is_some_and(|s| !s.trim().is_empty())
}
