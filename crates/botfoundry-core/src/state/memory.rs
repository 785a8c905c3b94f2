//! In-memory state store for ephemeral bots and tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use botfoundry_types::bot::BotId;
use botfoundry_types::error::StateError;
use botfoundry_types::state::StateRecord;

use super::StateStore;

/// Process-local [`StateStore`]. Versions are monotonic per bot; the map
/// entry lock serializes concurrent writers to the same bot.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: DashMap<BotId, Vec<StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, bot_id: BotId, payload: serde_json::Value) -> Result<u64, StateError> {
        let mut entry = self.records.entry(bot_id).or_default();
        let version = entry.last().map_or(0, |r| r.version) + 1;
        entry.push(StateRecord {
            bot_id,
            version,
            payload,
            saved_at: Utc::now(),
        });
        Ok(version)
    }

    async fn save_if(
        &self,
        bot_id: BotId,
        expected_version: u64,
        payload: serde_json::Value,
    ) -> Result<u64, StateError> {
        let mut entry = self.records.entry(bot_id).or_default();
        let actual = entry.last().map_or(0, |r| r.version);
        if actual != expected_version {
            return Err(StateError::Conflict {
                expected: expected_version,
                actual,
            });
        }
        let version = actual + 1;
        entry.push(StateRecord {
            bot_id,
            version,
            payload,
            saved_at: Utc::now(),
        });
        Ok(version)
    }

    async fn load(&self, bot_id: BotId) -> Result<Option<StateRecord>, StateError> {
        Ok(self
            .records
            .get(&bot_id)
            .and_then(|records| records.last().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = MemoryStateStore::new();
        let bot_id = BotId::new();

        let payload = serde_json::json!({"cursor": 7});
        let version = store.save(bot_id, payload.clone()).await.unwrap();
        assert_eq!(version, 1);

        let loaded = store.load(bot_id).await.unwrap().unwrap();
        assert_eq!(loaded.payload, payload);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_versions_are_monotonic() {
        let store = MemoryStateStore::new();
        let bot_id = BotId::new();

        for expected in 1..=5u64 {
            let v = store
                .save(bot_id, serde_json::json!({"n": expected}))
                .await
                .unwrap();
            assert_eq!(v, expected);
        }
        let loaded = store.load(bot_id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 5);
        assert_eq!(loaded.payload["n"], 5);
    }

    #[tokio::test]
    async fn test_load_unknown_bot_returns_none() {
        let store = MemoryStateStore::new();
        assert!(store.load(BotId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_if_detects_conflict() {
        let store = MemoryStateStore::new();
        let bot_id = BotId::new();

        store.save(bot_id, serde_json::json!(1)).await.unwrap();
        store.save(bot_id, serde_json::json!(2)).await.unwrap();

        let err = store
            .save_if(bot_id, 1, serde_json::json!(3))
            .await
            .unwrap_err();
        match err {
            StateError::Conflict { expected, actual } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_save_if_succeeds_on_match() {
        let store = MemoryStateStore::new();
        let bot_id = BotId::new();

        let v1 = store
            .save_if(bot_id, 0, serde_json::json!("first"))
            .await
            .unwrap();
        assert_eq!(v1, 1);
        let v2 = store
            .save_if(bot_id, 1, serde_json::json!("second"))
            .await
            .unwrap();
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn test_bots_are_isolated() {
        let store = MemoryStateStore::new();
        let a = BotId::new();
        let b = BotId::new();

        store.save(a, serde_json::json!("a")).await.unwrap();
        store.save(b, serde_json::json!("b")).await.unwrap();

        assert_eq!(store.load(a).await.unwrap().unwrap().payload, "a");
        assert_eq!(store.load(b).await.unwrap().unwrap().payload, "b");
    }
}
