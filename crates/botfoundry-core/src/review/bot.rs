//! The PR review bot.
//!
//! Polls the governance manager for pending integration reviews that
//! carry a pull-request url, runs each through the external analysis
//! service, and applies the decision policy. Analysis failures retry on a
//! bounded exponential backoff; an exhausted budget forces mandatory
//! human review. Completed analyses are stored as precedent data points,
//! and XP for human-completed reviews is credited exactly once per
//! review id.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use botfoundry_types::analysis::{AnalysisPoll, AnalysisReport, PrReviewDataPoint};
use botfoundry_types::error::BotError;
use botfoundry_types::event::{BusEvent, EventKind};
use botfoundry_types::review::Review;

use crate::bot::{BotBehavior, BotContext, ExecuteError};
use crate::governance::GovernanceManager;
use crate::knowledge::KnowledgeStore;

use super::backoff::Backoff;
use super::decision::{decide, ReviewAction};
use super::service::PrAnalysisService;
use super::xp::XpLedger;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InflightAnalysis {
    pr_url: String,
    /// Set once `submit` succeeds.
    analysis_id: Option<Uuid>,
    /// Consecutive transient failures (submit or fetch).
    failures: u32,
    /// Earliest time the next retry may run.
    next_attempt_at: Option<DateTime<Utc>>,
}

/// Durable bot state. Saving this after each tick is what makes decisions
/// and XP credits survive restarts without re-applying.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrReviewState {
    /// Keyed by review id.
    inflight: BTreeMap<Uuid, InflightAnalysis>,
    /// Reviews this bot has already acted on.
    processed: BTreeSet<Uuid>,
    /// Reviews whose XP has been credited.
    credited: BTreeSet<Uuid>,
}

pub struct PrReviewBot {
    governance: Arc<GovernanceManager>,
    analysis: Arc<dyn PrAnalysisService>,
    knowledge: Arc<dyn KnowledgeStore>,
    ledger: Arc<dyn XpLedger>,
    backoff: Backoff,
    state: tokio::sync::Mutex<PrReviewState>,
}

impl PrReviewBot {
    pub fn new(
        governance: Arc<GovernanceManager>,
        analysis: Arc<dyn PrAnalysisService>,
        knowledge: Arc<dyn KnowledgeStore>,
        ledger: Arc<dyn XpLedger>,
    ) -> Self {
        Self {
            governance,
            analysis,
            knowledge,
            ledger,
            backoff: Backoff::default(),
            state: tokio::sync::Mutex::new(PrReviewState::default()),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Detect new work: any pending integration review with a PR url that
    /// the bot is not already tracking.
    async fn enqueue_new_reviews(&self, state: &mut PrReviewState) {
        for (review, integration) in self.governance.pending_pr_reviews().await {
            if state.processed.contains(&review.id) || state.inflight.contains_key(&review.id) {
                continue;
            }
            let Some(pr_url) = integration.pr_url.clone() else {
                continue;
            };
            info!(review = %review.id, pr = %pr_url, "tracking new integration PR");
            state.inflight.insert(
                review.id,
                InflightAnalysis {
                    pr_url,
                    analysis_id: None,
                    failures: 0,
                    next_attempt_at: None,
                },
            );
        }
    }

    /// Advance one tracked review: submit if needed, otherwise poll.
    async fn advance(
        &self,
        ctx: &BotContext,
        state: &mut PrReviewState,
        review_id: Uuid,
    ) -> anyhow::Result<()> {
        let Some(entry) = state.inflight.get(&review_id).cloned() else {
            return Ok(());
        };
        if entry
            .next_attempt_at
            .is_some_and(|earliest| Utc::now() < earliest)
        {
            return Ok(());
        }

        // The review may have been cancelled or reassigned since the last
        // tick; abandon tracking if it left the queue.
        let review = match self.governance.review(review_id).await {
            Ok(review) if !review.status.is_terminal() && !review.analysis_failed => review,
            _ => {
                debug!(review = %review_id, "review left the queue, abandoning analysis");
                state.inflight.remove(&review_id);
                state.processed.insert(review_id);
                return Ok(());
            }
        };

        match entry.analysis_id {
            None => match self.analysis.submit(&entry.pr_url).await {
                Ok(analysis_id) => {
                    debug!(review = %review_id, analysis = %analysis_id, "analysis submitted");
                    if let Some(tracked) = state.inflight.get_mut(&review_id) {
                        tracked.analysis_id = Some(analysis_id);
                        tracked.failures = 0;
                        tracked.next_attempt_at = None;
                    }
                }
                Err(err) => {
                    self.register_failure(ctx, state, review_id, &err.to_string())
                        .await?
                }
            },
            Some(analysis_id) => match self.analysis.fetch_result(analysis_id).await {
                Ok(AnalysisPoll::Pending) => {}
                Ok(AnalysisPoll::Ready(report)) => {
                    self.apply_report(ctx, &review, report, &entry.pr_url).await?;
                    state.inflight.remove(&review_id);
                    state.processed.insert(review_id);
                }
                Err(err) => {
                    self.register_failure(ctx, state, review_id, &err.to_string())
                        .await?
                }
            },
        }
        Ok(())
    }

    /// Count a transient failure; on budget exhaustion the review is
    /// flagged `analysis_failed` and forced to the human queue -- never
    /// silently auto-approved.
    async fn register_failure(
        &self,
        ctx: &BotContext,
        state: &mut PrReviewState,
        review_id: Uuid,
        error: &str,
    ) -> anyhow::Result<()> {
        let Some(entry) = state.inflight.get_mut(&review_id) else {
            return Ok(());
        };
        entry.failures += 1;
        warn!(review = %review_id, failures = entry.failures, "analysis attempt failed: {error}");

        match self.backoff.delay_after(entry.failures) {
            Some(delay) => {
                entry.next_attempt_at = Some(
                    Utc::now()
                        + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::zero()),
                );
                Ok(())
            }
            None => {
                state.inflight.remove(&review_id);
                state.processed.insert(review_id);
                // An empty reviewer queue still flags the review for
                // humans to pick up.
                self.governance
                    .mark_analysis_failed(review_id, ctx.entry.reviewers.clone())
                    .await?;
                Ok(())
            }
        }
    }

    /// Apply the decision policy to a completed analysis.
    async fn apply_report(
        &self,
        ctx: &BotContext,
        review: &Review,
        report: AnalysisReport,
        pr_url: &str,
    ) -> anyhow::Result<()> {
        let integration = match review.integration_id {
            Some(id) => self.governance.integration(id).await?,
            None => anyhow::bail!("integration review {} has no linked integration", review.id),
        };

        let threshold = ctx.entry.auto_approve_confidence_threshold;
        let action = decide(report.risk_level, report.confidence, threshold);
        info!(
            review = %review.id,
            risk = %report.risk_level,
            confidence = report.confidence,
            ?action,
            "analysis complete"
        );

        match action {
            ReviewAction::AutoReject => {
                let rationale = self.rejection_report(&report).await;
                self.governance
                    .reject_integration(integration.id, &rationale, true)
                    .await?;
            }
            ReviewAction::AssignHuman | ReviewAction::FlagForHumanReview => {
                self.governance
                    .attach_suggestions(review.id, report.suggestions.clone())
                    .await?;
                self.governance
                    .assign_reviewers(review.id, ctx.entry.reviewers.clone())
                    .await?;
            }
            ReviewAction::AutoApprove => {
                self.governance
                    .approve_integration(
                        integration.id,
                        Some(format!(
                            "auto-approved: risk {}, confidence {:.2} >= {:.2}",
                            report.risk_level, report.confidence, threshold
                        )),
                    )
                    .await?;
            }
        }

        self.store_data_point(pr_url, &report).await;
        Ok(())
    }

    /// Detailed rejection report: the exported markdown when available, a
    /// generated summary otherwise.
    async fn rejection_report(&self, report: &AnalysisReport) -> String {
        let body = match self.analysis.export_markdown(report.analysis_id).await {
            Ok(markdown) => markdown,
            Err(err) => {
                warn!(analysis = %report.analysis_id, "markdown export failed: {err}");
                format!(
                    "clusters: {}; suggestions: {}",
                    report.clusters.join(", "),
                    report.suggestions.join("; "),
                )
            }
        };
        format!(
            "critical risk auto-rejection (confidence {:.2}); approval requires a new human-initiated review\n\n{body}",
            report.confidence
        )
    }

    /// Persist the completed analysis as precedent. Best effort: a
    /// knowledge-store failure never blocks the decision.
    async fn store_data_point(&self, pr_url: &str, report: &AnalysisReport) {
        let point = PrReviewDataPoint {
            pr_url: pr_url.to_string(),
            analysis_id: report.analysis_id,
            risk_level: report.risk_level,
            clusters: report.clusters.clone(),
            suggestions: report.suggestions.clone(),
            confidence: report.confidence,
            reviewer_xp: None,
            recorded_at: Utc::now(),
        };
        if let Err(err) = self.knowledge.store_data_point(point).await {
            warn!("failed to store PR review data point: {err}");
        }
    }

    /// Credit XP for human-completed reviews, once per review id.
    async fn credit_xp(&self, ctx: &BotContext, state: &mut PrReviewState) -> anyhow::Result<()> {
        for review in self.governance.finalized_human_reviews().await {
            if state.credited.contains(&review.id) {
                continue;
            }
            let amount = match self.analysis.fetch_xp(review.id).await {
                Ok(amount) => amount,
                Err(err) => {
                    // Transient: leave uncredited and retry next tick.
                    warn!(review = %review.id, "xp fetch failed: {err}");
                    continue;
                }
            };
            for reviewer in review.decisions.keys() {
                let applied = self.ledger.credit(reviewer, review.id, amount).await?;
                if applied {
                    ctx.bus.publish(BusEvent::new(
                        EventKind::XpAwarded,
                        Some(ctx.bot_id),
                        serde_json::json!({
                            "review_id": review.id,
                            "reviewer": reviewer,
                            "amount": amount,
                        }),
                    ));
                }
            }
            state.credited.insert(review.id);
        }
        Ok(())
    }

    async fn save_state(&self, ctx: &BotContext, state: &PrReviewState) -> anyhow::Result<()> {
        let payload = serde_json::to_value(state)?;
        ctx.state.save(ctx.bot_id, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl BotBehavior for PrReviewBot {
    async fn initialize(&self, ctx: &BotContext) -> Result<(), BotError> {
        // Resume tracking state; nothing here re-applies decisions the
        // saved payload already captures.
        if let Some(record) = ctx
            .state
            .load(ctx.bot_id)
            .await
            .map_err(|e| BotError::InitFailed(e.to_string()))?
        {
            let restored: PrReviewState = serde_json::from_value(record.payload)
                .map_err(|e| BotError::InitFailed(format!("corrupt pr-review state: {e}")))?;
            *self.state.lock().await = restored;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &BotContext) -> Result<(), ExecuteError> {
        let mut state = self.state.lock().await;

        self.enqueue_new_reviews(&mut state).await;

        let tracked: Vec<Uuid> = state.inflight.keys().copied().collect();
        for review_id in tracked {
            if ctx.cancel.is_cancelled() {
                // Shutting down: abandon outstanding external calls.
                break;
            }
            self.advance(ctx, &mut state, review_id)
                .await
                .map_err(ExecuteError::Recoverable)?;
        }

        self.credit_xp(ctx, &mut state).await.map_err(ExecuteError::Recoverable)?;
        self.save_state(ctx, &state).await.map_err(ExecuteError::Recoverable)?;
        Ok(())
    }

    async fn cleanup(&self, ctx: &BotContext) {
        let state = self.state.lock().await;
        if let Err(err) = self.save_state(ctx, &state).await {
            warn!("pr-review cleanup save failed: {err:#}");
        }
    }
}
