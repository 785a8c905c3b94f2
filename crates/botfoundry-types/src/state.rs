//! Persisted bot state records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bot::BotId;

/// One durable version of a bot's state.
///
/// Versions are monotonically increasing per bot. A successful save
/// guarantees any later load observes that version or newer, including
/// across a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub bot_id: BotId,
    pub version: u64,
    pub payload: serde_json::Value,
    pub saved_at: DateTime<Utc>,
}
