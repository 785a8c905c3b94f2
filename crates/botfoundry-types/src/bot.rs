use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a bot, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotId(pub Uuid);

impl BotId {
    /// Create a new BotId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a BotId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Deterministic id derived from a configured bot name (UUID v5).
    ///
    /// State persistence is keyed by this id, so a restarted instance of
    /// the same config entry resumes its predecessor's state.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }
}

impl Default for BotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Bot lifecycle states.
///
/// Legal flow: Initializing -> Running -> {Paused <-> Running} -> Stopped.
/// Any state may fall into Error on an unrecoverable failure; Error is
/// terminal and only leaves via an explicit manual reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Initializing,
    Running,
    Paused,
    Stopped,
    Error,
}

impl BotStatus {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Error is reachable from everywhere and left only via `reset`
    /// (modeled as Error -> Initializing). Stopped is terminal.
    pub fn can_transition_to(self, next: BotStatus) -> bool {
        use BotStatus::*;
        if next == Error {
            return self != Error;
        }
        match self {
            Initializing => matches!(next, Running | Stopped),
            Running => matches!(next, Paused | Stopped),
            Paused => matches!(next, Running | Stopped),
            Stopped => false,
            Error => matches!(next, Initializing),
        }
    }

    /// Terminal states require manual intervention to leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, BotStatus::Stopped | BotStatus::Error)
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStatus::Initializing => write!(f, "initializing"),
            BotStatus::Running => write!(f, "running"),
            BotStatus::Paused => write!(f, "paused"),
            BotStatus::Stopped => write!(f, "stopped"),
            BotStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for BotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initializing" => Ok(BotStatus::Initializing),
            "running" => Ok(BotStatus::Running),
            "paused" => Ok(BotStatus::Paused),
            "stopped" => Ok(BotStatus::Stopped),
            "error" => Ok(BotStatus::Error),
            other => Err(format!("invalid bot status: '{other}'")),
        }
    }
}

/// The closed set of bot kinds the factory knows how to run.
///
/// Type-specific behavior is injected as a `BotBehavior` implementation;
/// the kind is bookkeeping for configuration and health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BotKind {
    /// Drives integration reviews from external PR analysis.
    PrReview,
    /// Subscribes to factory events and keeps a running tally.
    Monitor,
}

impl fmt::Display for BotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotKind::PrReview => write!(f, "pr-review"),
            BotKind::Monitor => write!(f, "monitor"),
        }
    }
}

impl FromStr for BotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pr-review" => Ok(BotKind::PrReview),
            "monitor" => Ok(BotKind::Monitor),
            other => Err(format!("invalid bot kind: '{other}'")),
        }
    }
}

/// Snapshot returned by `health_check()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotHealth {
    pub bot_id: BotId,
    pub kind: BotKind,
    pub status: BotStatus,
    /// Seconds since the runtime entered Running for the first time.
    pub uptime_secs: u64,
    pub error_count: u32,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_id_display_roundtrip() {
        let id = BotId::new();
        let parsed: BotId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_bot_id_from_name_is_stable() {
        assert_eq!(BotId::from_name("pr-review-1"), BotId::from_name("pr-review-1"));
        assert_ne!(BotId::from_name("pr-review-1"), BotId::from_name("pr-review-2"));
    }

    #[test]
    fn test_status_happy_path_transitions() {
        use BotStatus::*;
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopped));
        assert!(Paused.can_transition_to(Stopped));
    }

    #[test]
    fn test_status_error_reachable_from_all_but_itself() {
        use BotStatus::*;
        for from in [Initializing, Running, Paused, Stopped] {
            assert!(from.can_transition_to(Error), "{from} -> error");
        }
        assert!(!Error.can_transition_to(Error));
    }

    #[test]
    fn test_status_error_only_leaves_via_reset() {
        use BotStatus::*;
        assert!(Error.can_transition_to(Initializing));
        assert!(!Error.can_transition_to(Running));
        assert!(!Error.can_transition_to(Paused));
        assert!(!Error.can_transition_to(Stopped));
    }

    #[test]
    fn test_stopped_is_final() {
        use BotStatus::*;
        for next in [Initializing, Running, Paused] {
            assert!(!Stopped.can_transition_to(next), "stopped -> {next}");
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            BotStatus::Initializing,
            BotStatus::Running,
            BotStatus::Paused,
            BotStatus::Stopped,
            BotStatus::Error,
        ] {
            let parsed: BotStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [BotKind::PrReview, BotKind::Monitor] {
            let parsed: BotKind = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }
}
