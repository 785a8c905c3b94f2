//! State store trait.
//!
//! Defines the interface for versioned bot state persistence.
//! The SQLite implementation lives in botfoundry-infra;
//! [`super::MemoryStateStore`] covers ephemeral bots and tests.

use async_trait::async_trait;

use botfoundry_types::bot::BotId;
use botfoundry_types::error::StateError;
use botfoundry_types::state::StateRecord;

/// Versioned per-bot state persistence.
///
/// Versions increase monotonically per bot. `save` returning `Ok` means
/// the write is durable: any subsequent `load`, including after a crash,
/// observes that version or newer. Loading carries no side effects --
/// resuming from a saved payload must never re-apply work the payload
/// already captures.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Durably write a new version of the bot's state and return the
    /// version number assigned to it.
    async fn save(&self, bot_id: BotId, payload: serde_json::Value) -> Result<u64, StateError>;

    /// Optimistic write: succeeds only when the latest stored version
    /// equals `expected_version` (0 for "nothing stored yet").
    /// A mismatch is [`StateError::Conflict`]; retry with a fresh `load`.
    async fn save_if(
        &self,
        bot_id: BotId,
        expected_version: u64,
        payload: serde_json::Value,
    ) -> Result<u64, StateError>;

    /// Latest stored record, or `None` when the bot has never saved.
    async fn load(&self, bot_id: BotId) -> Result<Option<StateRecord>, StateError>;
}
