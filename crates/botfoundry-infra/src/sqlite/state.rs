//! SQLite state store implementation.
//!
//! Implements `StateStore` from `botfoundry-core` as an append-only table
//! of versioned records. Each bot is the single writer of its own key, so
//! the read-compute-insert version assignment sees no contention; the
//! `(bot_id, version)` primary key rejects any write that slips past that
//! assumption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use botfoundry_core::state::StateStore;
use botfoundry_types::bot::BotId;
use botfoundry_types::error::StateError;
use botfoundry_types::state::StateRecord;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `StateStore`.
pub struct SqliteStateStore {
    pool: DatabasePool,
}

impl SqliteStateStore {
    /// Create a new state store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn latest_version(&self, bot_id: BotId) -> Result<u64, StateError> {
        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS v FROM bot_state WHERE bot_id = ?")
            .bind(bot_id.to_string())
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| StateError::Storage(e.to_string()))?;
        let version: i64 = row
            .try_get("v")
            .map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(version as u64)
    }

    async fn insert(
        &self,
        bot_id: BotId,
        version: u64,
        payload: &serde_json::Value,
    ) -> Result<(), StateError> {
        let payload_str = serde_json::to_string(payload)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO bot_state (bot_id, version, payload, saved_at) VALUES (?, ?, ?, ?)",
        )
        .bind(bot_id.to_string())
        .bind(version as i64)
        .bind(payload_str)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StateError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save(&self, bot_id: BotId, payload: serde_json::Value) -> Result<u64, StateError> {
        let version = self.latest_version(bot_id).await? + 1;
        self.insert(bot_id, version, &payload).await?;
        Ok(version)
    }

    async fn save_if(
        &self,
        bot_id: BotId,
        expected_version: u64,
        payload: serde_json::Value,
    ) -> Result<u64, StateError> {
        let actual = self.latest_version(bot_id).await?;
        if actual != expected_version {
            return Err(StateError::Conflict {
                expected: expected_version,
                actual,
            });
        }
        let version = actual + 1;
        self.insert(bot_id, version, &payload).await?;
        Ok(version)
    }

    async fn load(&self, bot_id: BotId) -> Result<Option<StateRecord>, StateError> {
        let row = sqlx::query(
            "SELECT version, payload, saved_at FROM bot_state WHERE bot_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(bot_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| StateError::Storage(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let version: i64 = row
            .try_get("version")
            .map_err(|e| StateError::Storage(e.to_string()))?;
        let payload_str: String = row
            .try_get("payload")
            .map_err(|e| StateError::Storage(e.to_string()))?;
        let saved_at_str: String = row
            .try_get("saved_at")
            .map_err(|e| StateError::Storage(e.to_string()))?;

        let payload: serde_json::Value = serde_json::from_str(&payload_str)
            .map_err(|e| StateError::Serialization(format!("invalid JSON payload: {e}")))?;
        let saved_at = DateTime::parse_from_rfc3339(&saved_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StateError::Serialization(format!("invalid datetime: {e}")))?;

        Ok(Some(StateRecord {
            bot_id,
            version: version as u64,
            payload,
            saved_at,
        }))
    }
}
