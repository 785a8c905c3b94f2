//! SQLite connection pools for the factory's durable stores.
//!
//! A single writer connection serializes every mutation (SQLite's own
//! constraint), while a small reader pool serves concurrent lookups. Both
//! run in WAL mode so readers never block the writer.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

/// Upper bound on concurrent reader connections.
const MAX_READERS: u32 = 8;

/// Paired reader/writer pools over one SQLite database.
///
/// Mutations go through `writer`; its single connection means the
/// version-guarded upserts in the stores are serialized at the database
/// level. Queries go through `reader`.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open both pools and bring the schema up to date.
    ///
    /// Migrations run on the writer before the read-only pool opens, so a
    /// fresh database is fully created before anyone can query it.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts.clone())
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(MAX_READERS)
            .connect_with(opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Database URL derived from `BOTFOUNDRY_DATA_DIR`, defaulting to
/// `~/.botfoundry/botfoundry.db`.
pub fn default_database_url() -> String {
    let data_dir = std::env::var("BOTFOUNDRY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".botfoundry")
        });
    format!("sqlite://{}", data_dir.join("botfoundry.db").display())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp(name: &str) -> (tempfile::TempDir, DatabasePool) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join(name).display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn migrations_create_every_store_table() {
        let (_dir, pool) = open_temp("schema.db").await;

        for table in ["bot_state", "domains", "integrations", "reviews", "xp_ledger"] {
            let count: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool.reader)
            .await
            .unwrap();
            assert_eq!(count.0, 1, "{table} table missing");
        }
    }

    #[tokio::test]
    async fn writer_runs_in_wal_mode() {
        let (_dir, pool) = open_temp("wal.db").await;

        let mode: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(mode.0.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn reader_pool_rejects_writes() {
        let (_dir, pool) = open_temp("ro.db").await;

        let attempt = sqlx::query(
            "INSERT INTO bot_state (bot_id, version, payload, saved_at) VALUES ('b', 1, '{}', '')",
        )
        .execute(&pool.reader)
        .await;
        assert!(attempt.is_err(), "read-only pool accepted an INSERT");
    }

    #[test]
    fn default_url_points_into_data_dir() {
        let url = default_database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("botfoundry.db"));
    }
}
