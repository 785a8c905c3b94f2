//! Event types for the factory event bus.
//!
//! `BusEvent` is the envelope every publisher hands to the bus: a kind for
//! routing, an opaque JSON payload, the publishing bot (when there is one),
//! and a publish timestamp. Events are immutable once published and are
//! retained in per-kind history for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::bot::BotId;

/// Routing key for bus subscriptions. Subscribers register per kind;
/// ordering is guaranteed per kind per subscriber, never across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // -- bot lifecycle --
    BotStarted,
    BotPaused,
    BotResumed,
    BotStopped,
    BotErrored,

    // -- governance --
    DomainRegistered,
    IntegrationRequested,
    IntegrationApproved,
    IntegrationRejected,
    IntegrationCancelled,
    ReviewCreated,
    ReviewersAssigned,
    ReviewCancelled,
    AnalysisFailed,
    ComplianceEvaluated,

    // -- gamification --
    XpAwarded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::BotStarted => "bot_started",
            EventKind::BotPaused => "bot_paused",
            EventKind::BotResumed => "bot_resumed",
            EventKind::BotStopped => "bot_stopped",
            EventKind::BotErrored => "bot_errored",
            EventKind::DomainRegistered => "domain_registered",
            EventKind::IntegrationRequested => "integration_requested",
            EventKind::IntegrationApproved => "integration_approved",
            EventKind::IntegrationRejected => "integration_rejected",
            EventKind::IntegrationCancelled => "integration_cancelled",
            EventKind::ReviewCreated => "review_created",
            EventKind::ReviewersAssigned => "reviewers_assigned",
            EventKind::ReviewCancelled => "review_cancelled",
            EventKind::AnalysisFailed => "analysis_failed",
            EventKind::ComplianceEvaluated => "compliance_evaluated",
            EventKind::XpAwarded => "xp_awarded",
        };
        write!(f, "{s}")
    }
}

/// An immutable event as published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub kind: EventKind,
    /// The bot that published the event, when it came from a bot.
    pub source: Option<BotId>,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl BusEvent {
    /// Build an event stamped with a fresh v7 id and the current time.
    pub fn new(kind: EventKind, source: Option<BotId>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            source,
            payload,
            published_at: Utc::now(),
        }
    }
}
