//! The PR review decision policy.
//!
//! A pure function so the precedence rules are trivially testable. Risk
//! outranks confidence: a critical finding rejects no matter how sure the
//! analyzer is, and moderate risk always goes to humans.

use botfoundry_types::analysis::RiskLevel;

/// What the bot does with a completed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    /// Critical risk: reject now; only a fresh human-initiated review can
    /// approve after this.
    AutoReject,
    /// Moderate risk: never auto-decide, hand to the reviewer queue with
    /// the analyzer's suggestions attached.
    AssignHuman,
    /// Low/no risk with enough confidence: approve and notify.
    AutoApprove,
    /// Risk is low but the analyzer is unsure: a human confirms.
    FlagForHumanReview,
}

/// Apply the decision policy in precedence order.
pub fn decide(risk: RiskLevel, confidence: f64, threshold: f64) -> ReviewAction {
    match risk {
        RiskLevel::Critical => ReviewAction::AutoReject,
        RiskLevel::Moderate => ReviewAction::AssignHuman,
        RiskLevel::Low | RiskLevel::None => {
            if confidence >= threshold {
                ReviewAction::AutoApprove
            } else {
                ReviewAction::FlagForHumanReview
            }
        }
    }
}
