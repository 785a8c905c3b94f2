//! SQLite XP ledger.
//!
//! The `(review_id, reviewer)` primary key plus `INSERT OR IGNORE` is the
//! idempotency guarantee: a redelivered award trigger inserts zero rows
//! and the balance is untouched.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use botfoundry_core::review::XpLedger;
use botfoundry_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `XpLedger`.
pub struct SqliteXpLedger {
    pool: DatabasePool,
}

impl SqliteXpLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl XpLedger for SqliteXpLedger {
    async fn credit(
        &self,
        reviewer: &str,
        review_id: Uuid,
        amount: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO xp_ledger (review_id, reviewer, amount, credited_at) VALUES (?, ?, ?, ?)",
        )
        .bind(review_id.to_string())
        .bind(reviewer)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn total(&self, reviewer: &str) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COALESCE(SUM(amount), 0) AS total FROM xp_ledger WHERE reviewer = ?")
            .bind(reviewer)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row.try_get("total")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}
