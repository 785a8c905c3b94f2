//! Reviewer XP ledger.
//!
//! Crediting is idempotent per `(review_id, reviewer)`, so redelivered
//! award triggers can never double-credit. The SQLite implementation in
//! botfoundry-infra enforces the same key with a unique constraint.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use botfoundry_types::error::RepositoryError;

#[async_trait]
pub trait XpLedger: Send + Sync {
    /// Credit `amount` to `reviewer` for `review_id`. Returns `true` when
    /// the credit was applied, `false` when this pair was already
    /// credited (no balance change).
    async fn credit(
        &self,
        reviewer: &str,
        review_id: Uuid,
        amount: i64,
    ) -> Result<bool, RepositoryError>;

    /// Total XP accumulated by a reviewer.
    async fn total(&self, reviewer: &str) -> Result<i64, RepositoryError>;
}

/// Process-local ledger for tests and ephemeral factories.
#[derive(Debug, Default)]
pub struct MemoryXpLedger {
    totals: DashMap<String, i64>,
    credited: Mutex<HashSet<(Uuid, String)>>,
}

impl MemoryXpLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl XpLedger for MemoryXpLedger {
    async fn credit(
        &self,
        reviewer: &str,
        review_id: Uuid,
        amount: i64,
    ) -> Result<bool, RepositoryError> {
        let mut credited = self.credited.lock().unwrap_or_else(|e| e.into_inner());
        if !credited.insert((review_id, reviewer.to_string())) {
            return Ok(false);
        }
        *self.totals.entry(reviewer.to_string()).or_insert(0) += amount;
        Ok(true)
    }

    async fn total(&self, reviewer: &str) -> Result<i64, RepositoryError> {
        Ok(self.totals.get(reviewer).map(|t| *t).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_credit_accumulates() {
        let ledger = MemoryXpLedger::new();
        assert!(ledger.credit("rivera", Uuid::now_v7(), 50).await.unwrap());
        assert!(ledger.credit("rivera", Uuid::now_v7(), 25).await.unwrap());
        assert_eq!(ledger.total("rivera").await.unwrap(), 75);
    }

    #[tokio::test]
    async fn test_redelivery_does_not_double_credit() {
        let ledger = MemoryXpLedger::new();
        let review_id = Uuid::now_v7();
        assert!(ledger.credit("rivera", review_id, 50).await.unwrap());
        assert!(!ledger.credit("rivera", review_id, 50).await.unwrap());
        assert_eq!(ledger.total("rivera").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_same_review_different_reviewers() {
        let ledger = MemoryXpLedger::new();
        let review_id = Uuid::now_v7();
        assert!(ledger.credit("rivera", review_id, 50).await.unwrap());
        assert!(ledger.credit("chen", review_id, 50).await.unwrap());
        assert_eq!(ledger.total("chen").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_unknown_reviewer_has_zero() {
        let ledger = MemoryXpLedger::new();
        assert_eq!(ledger.total("nobody").await.unwrap(), 0);
    }
}
