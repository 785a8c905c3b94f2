//! SQLite governance repository.
//!
//! Implements `GovernanceRepo` from `botfoundry-core`. Records are stored
//! as JSON keyed by domain code / integration id / review id; the version
//! column rejects stale overwrites so a redelivered save can never roll a
//! record backwards.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use botfoundry_core::governance::GovernanceRepo;
use botfoundry_types::error::RepositoryError;
use botfoundry_types::governance::{Domain, Integration};
use botfoundry_types::review::Review;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `GovernanceRepo`.
pub struct SqliteGovernanceRepo {
    pool: DatabasePool,
}

impl SqliteGovernanceRepo {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        table: &str,
        key: &str,
        record: &impl serde::Serialize,
        version: u64,
    ) -> Result<(), RepositoryError> {
        let record_str = serde_json::to_string(record)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize record: {e}")))?;
        let key_column = if table == "domains" { "code" } else { "id" };
        // Stale writes (version older than what is stored) are ignored.
        let sql = format!(
            "INSERT INTO {table} ({key_column}, record, version, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT ({key_column}) DO UPDATE
             SET record = excluded.record, version = excluded.version, updated_at = excluded.updated_at
             WHERE excluded.version >= {table}.version"
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(&record_str)
            .bind(version as i64)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn load_all<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
    ) -> Result<Vec<T>, RepositoryError> {
        let sql = format!("SELECT record FROM {table}");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record_str: String = row
                .try_get("record")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let record: T = serde_json::from_str(&record_str)
                .map_err(|e| RepositoryError::Query(format!("invalid record JSON: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl GovernanceRepo for SqliteGovernanceRepo {
    async fn save_domain(&self, domain: &Domain) -> Result<(), RepositoryError> {
        self.upsert("domains", &domain.code, domain, domain.version).await
    }

    async fn save_integration(&self, integration: &Integration) -> Result<(), RepositoryError> {
        self.upsert(
            "integrations",
            &integration.id.to_string(),
            integration,
            integration.version,
        )
        .await
    }

    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError> {
        self.upsert("reviews", &review.id.to_string(), review, review.version)
            .await
    }

    async fn load_domains(&self) -> Result<Vec<Domain>, RepositoryError> {
        self.load_all("domains").await
    }

    async fn load_integrations(&self) -> Result<Vec<Integration>, RepositoryError> {
        self.load_all("integrations").await
    }

    async fn load_reviews(&self) -> Result<Vec<Review>, RepositoryError> {
        self.load_all("reviews").await
    }
}
